use std::io::{self, BufRead, Write};

use uuid::Uuid;

use crate::assessment::AssessmentSession;
use crate::bank;
use crate::goals::GoalPlan;
use crate::reflection::{PostActivity, PreActivity, Worry, CONFIDENCE_AREAS};
use crate::report;
use crate::store::Store;
use crate::wizard::{Flow, Wizard, WizardState};

/// Line-based terminal front end for the wizards.
pub struct Console<R, W> {
    input: R,
    output: W,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Back,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Next,
    Back,
    Quit,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn say(&mut self, text: impl AsRef<str>) -> io::Result<()> {
        writeln!(self.output, "{}", text.as_ref())
    }

    /// `b` goes back, `q` or end of input quits, anything else is text.
    pub fn ask(&mut self, prompt: &str) -> io::Result<Reply> {
        write!(self.output, "{prompt} > ")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(Reply::Quit);
        }
        Ok(match line.trim() {
            "b" => Reply::Back,
            "q" => Reply::Quit,
            text => Reply::Text(text.to_string()),
        })
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }
}

/// A flow that knows how to ask for one of its steps on a console.
pub trait Interactive: Flow {
    fn prompt_step<R: BufRead, W: Write>(
        &mut self,
        step: usize,
        console: &mut Console<R, W>,
    ) -> io::Result<StepOutcome>;

    fn summary(&self) -> String;
}

/// Drive a wizard to completion. Returns the saved row id, or `None` when
/// the user stops early. `on_progress` sees the flow after every step.
pub async fn run<F, R, W>(
    wizard: &mut Wizard<F>,
    console: &mut Console<R, W>,
    store: &dyn Store,
    owner_id: Uuid,
    mut on_progress: impl FnMut(&F),
) -> anyhow::Result<Option<Uuid>>
where
    F: Interactive,
    R: BufRead,
    W: Write,
{
    loop {
        match wizard.state() {
            WizardState::Answering(step) => {
                let Some(flow) = wizard.flow_mut() else {
                    continue;
                };
                match flow.prompt_step(step, console)? {
                    StepOutcome::Next => {
                        on_progress(wizard.flow());
                        if !wizard.advance() {
                            console.say("Please finish this step before moving on.")?;
                        }
                    }
                    StepOutcome::Back => {
                        if !wizard.retreat() {
                            console.say("This is the first step.")?;
                        }
                    }
                    StepOutcome::Quit => {
                        on_progress(wizard.flow());
                        return Ok(None);
                    }
                }
            }
            WizardState::Reviewing => {
                console.say(wizard.flow().summary())?;
                match console.ask("Submit? [y/N]")? {
                    Reply::Text(answer) if answer.eq_ignore_ascii_case("y") => {
                        if let Err(err) = wizard.submit(store, owner_id).await {
                            console.say(err.notice().to_string())?;
                        }
                    }
                    _ => return Ok(None),
                }
            }
            WizardState::Submitted(id) => return Ok(Some(id)),
        }
    }
}

fn text_step<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    prompt: &str,
    field: &mut String,
) -> io::Result<StepOutcome> {
    if !field.is_empty() {
        console.say(format!("(currently: {field}; press Enter to keep)"))?;
    }
    Ok(match console.ask(prompt)? {
        Reply::Text(text) => {
            if !text.is_empty() {
                *field = text;
            }
            StepOutcome::Next
        }
        Reply::Back => StepOutcome::Back,
        Reply::Quit => StepOutcome::Quit,
    })
}

/// Ask for a 1-10 value until one is accepted. `Ok(None)` means keep the
/// current value; `Err` carries a navigation outcome.
fn rating<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    prompt: &str,
    current: Option<u8>,
) -> io::Result<Result<Option<u8>, StepOutcome>> {
    loop {
        match console.ask(prompt)? {
            Reply::Back => return Ok(Err(StepOutcome::Back)),
            Reply::Quit => return Ok(Err(StepOutcome::Quit)),
            Reply::Text(text) if text.is_empty() && current.is_some() => return Ok(Ok(None)),
            Reply::Text(text) => match text.parse::<u8>() {
                Ok(value) if (1..=10).contains(&value) => return Ok(Ok(Some(value))),
                _ => console.say("Please enter a number from 1 to 10.")?,
            },
        }
    }
}

impl Interactive for AssessmentSession {
    fn prompt_step<R: BufRead, W: Write>(
        &mut self,
        step: usize,
        console: &mut Console<R, W>,
    ) -> io::Result<StepOutcome> {
        let Some(skill) = bank::skills().get(step) else {
            return Ok(StepOutcome::Quit);
        };
        console.say(format!(
            "\n== {} ({}/{}) ==",
            skill.title,
            step + 1,
            bank::skills().len()
        ))?;

        let mut index = 0;
        while let Some(question) = skill.questions.get(index) {
            console.say(question.prompt)?;
            let current = self.answers().get(question.id);
            for (position, option) in question.options(self.variant()).enumerate() {
                let marker = if current == Some(option.score) { "*" } else { " " };
                console.say(format!(" {marker}{}) {}", position + 1, option.text))?;
            }

            match console.ask("Choose a number (b = back, q = save and quit)")? {
                Reply::Quit => return Ok(StepOutcome::Quit),
                Reply::Back if index == 0 => return Ok(StepOutcome::Back),
                Reply::Back => index -= 1,
                Reply::Text(text) if text.is_empty() && current.is_some() => index += 1,
                Reply::Text(text) => match text.parse::<usize>() {
                    Ok(choice) if choice >= 1 => match self.answer(question.id, choice - 1) {
                        Ok(_) => index += 1,
                        Err(err) => console.say(err.notice().to_string())?,
                    },
                    _ => console.say("Please enter a number from the list.")?,
                },
            }
        }
        Ok(StepOutcome::Next)
    }

    fn summary(&self) -> String {
        format!(
            "\nYour results:\n{}",
            report::render_scores(&self.scores(), self.variant())
        )
    }
}

impl PreActivity {
    fn confidence_step<R: BufRead, W: Write>(
        &mut self,
        console: &mut Console<R, W>,
    ) -> io::Result<StepOutcome> {
        loop {
            console.say("Rate your confidence from 1 to 10:")?;
            for (area, label) in CONFIDENCE_AREAS.iter().enumerate() {
                let current = self.confidence.ratings()[area];
                let value = match rating(console, label, current)? {
                    Ok(Some(value)) => value,
                    Ok(None) => continue,
                    Err(outcome) => return Ok(outcome),
                };
                match self.confidence.rate(area, value) {
                    Ok(Some(discarded)) => console.say(format!(
                        "Your confidence is back up, so your notes about '{}' were cleared.",
                        discarded.reason.label()
                    ))?,
                    Ok(None) => {}
                    Err(err) => console.say(err.notice().to_string())?,
                }
            }

            if !self.confidence.needs_support() {
                return Ok(StepOutcome::Next);
            }

            let average = self.confidence.average().unwrap_or_default();
            console.say(format!(
                "Your average confidence is {average:.1}. Let's look at what is on your mind."
            ))?;
            for (position, worry) in Worry::ALL.iter().enumerate() {
                console.say(format!("  {}) {}", position + 1, worry.label()))?;
            }

            let reason = match console.ask("Pick a worry, or r to re-rate")? {
                Reply::Back => return Ok(StepOutcome::Back),
                Reply::Quit => return Ok(StepOutcome::Quit),
                Reply::Text(text) if text == "r" => continue,
                Reply::Text(text) => match text.parse::<usize>() {
                    Ok(choice) if (1..=Worry::ALL.len()).contains(&choice) => {
                        Worry::ALL[choice - 1]
                    }
                    _ => {
                        console.say("Please pick one of the listed worries.")?;
                        continue;
                    }
                },
            };

            let support = match self.confidence.select_worry(reason) {
                Ok(support) => support,
                Err(err) => {
                    console.say(err.notice().to_string())?;
                    continue;
                }
            };
            while let Some(line) = support.current_line() {
                console.say(line)?;
                match console.ask("(Enter to continue, b = back)")? {
                    Reply::Quit => return Ok(StepOutcome::Quit),
                    Reply::Back => return Ok(StepOutcome::Back),
                    Reply::Text(_) => {
                        support.next_line();
                    }
                }
            }
            return Ok(StepOutcome::Next);
        }
    }
}

impl Interactive for PreActivity {
    fn prompt_step<R: BufRead, W: Write>(
        &mut self,
        step: usize,
        console: &mut Console<R, W>,
    ) -> io::Result<StepOutcome> {
        match step {
            0 => text_step(
                console,
                "What do you want to get out of this session?",
                &mut self.activity_goal,
            ),
            1 => self.confidence_step(console),
            2 => text_step(console, "Pick a focus word for today", &mut self.focus_word),
            _ => Ok(StepOutcome::Quit),
        }
    }

    fn summary(&self) -> String {
        let worry = self
            .confidence
            .support()
            .map(|support| support.reason.label())
            .unwrap_or("none");
        format!(
            "\nGoal: {}\nAverage confidence: {:.1}\nWorry talked through: {}\nFocus word: {}",
            self.activity_goal,
            self.confidence.average().unwrap_or_default(),
            worry,
            self.focus_word
        )
    }
}

impl Interactive for PostActivity {
    fn prompt_step<R: BufRead, W: Write>(
        &mut self,
        step: usize,
        console: &mut Console<R, W>,
    ) -> io::Result<StepOutcome> {
        match step {
            0 => match rating(console, "How hard did you work, 1 to 10?", self.effort())? {
                Ok(Some(value)) => {
                    if let Err(err) = self.set_effort(value) {
                        console.say(err.notice().to_string())?;
                    }
                    Ok(StepOutcome::Next)
                }
                Ok(None) => Ok(StepOutcome::Next),
                Err(outcome) => Ok(outcome),
            },
            1 => text_step(console, "What went well?", &mut self.went_well),
            2 => text_step(console, "What will you work on next?", &mut self.work_on),
            _ => Ok(StepOutcome::Quit),
        }
    }

    fn summary(&self) -> String {
        format!(
            "\nEffort: {}\nWent well: {}\nWork on: {}",
            self.effort().unwrap_or_default(),
            self.went_well,
            self.work_on
        )
    }
}

impl GoalPlan {
    fn skill_step<R: BufRead, W: Write>(
        &mut self,
        console: &mut Console<R, W>,
    ) -> io::Result<StepOutcome> {
        console.say("Which skill do you want to work on?")?;
        let current = self.skill().map(|skill| skill.id);
        for (position, skill) in bank::skills().iter().enumerate() {
            let marker = if current == Some(skill.id) { "*" } else { " " };
            console.say(format!(" {marker}{}) {}", position + 1, skill.title))?;
        }
        Ok(match console.ask("Choose a number")? {
            Reply::Back => StepOutcome::Back,
            Reply::Quit => StepOutcome::Quit,
            Reply::Text(text) if text.is_empty() => StepOutcome::Next,
            Reply::Text(text) => {
                match text
                    .parse::<usize>()
                    .ok()
                    .and_then(|choice| choice.checked_sub(1))
                    .and_then(|index| bank::skills().get(index))
                {
                    Some(skill) => {
                        if let Err(err) = self.choose_skill(skill.id) {
                            console.say(err.notice().to_string())?;
                        }
                    }
                    None => console.say("Please enter a number from the list.")?,
                }
                StepOutcome::Next
            }
        })
    }

    fn date_step<R: BufRead, W: Write>(
        &mut self,
        console: &mut Console<R, W>,
    ) -> io::Result<StepOutcome> {
        if let Some(date) = self.target_date() {
            console.say(format!("(currently: {date}; press Enter to keep)"))?;
        }
        Ok(match console.ask("When do you want to reach it? (YYYY-MM-DD)")? {
            Reply::Back => StepOutcome::Back,
            Reply::Quit => StepOutcome::Quit,
            Reply::Text(text) if text.is_empty() => StepOutcome::Next,
            Reply::Text(text) => {
                match chrono::NaiveDate::parse_from_str(&text, "%Y-%m-%d") {
                    Ok(date) => {
                        if let Err(err) = self.set_target_date(date) {
                            console.say(err.notice().to_string())?;
                        }
                    }
                    Err(_) => console.say("Please enter a date like 2026-11-30.")?,
                }
                StepOutcome::Next
            }
        })
    }
}

impl Interactive for GoalPlan {
    fn prompt_step<R: BufRead, W: Write>(
        &mut self,
        step: usize,
        console: &mut Console<R, W>,
    ) -> io::Result<StepOutcome> {
        match step {
            0 => self.skill_step(console),
            1 => text_step(console, "What is your goal?", &mut self.goal),
            2 => text_step(
                console,
                "What is the first thing you will do?",
                &mut self.first_step,
            ),
            3 => self.date_step(console),
            _ => Ok(StepOutcome::Quit),
        }
    }

    fn summary(&self) -> String {
        format!(
            "\nSkill: {}\nGoal: {}\nFirst step: {}\nTarget date: {}",
            self.skill().map(|skill| skill.title).unwrap_or("none"),
            self.goal,
            self.first_step,
            self.target_date()
                .map(|date| date.to_string())
                .unwrap_or_default()
        )
    }
}
