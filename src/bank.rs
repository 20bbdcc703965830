use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoachError;

/// Who fills in the Core Skills Assessment. Both variants share one bank and
/// differ only in how an option's position becomes a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Player answers about themselves; options score 25/50/75/100.
    #[serde(rename = "self")]
    SelfAssessment,
    /// Coach rates the player; options score 1-4 and are rescaled later.
    Admin,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::SelfAssessment => "self",
            Variant::Admin => "admin",
        }
    }

    /// Score stored for the option at `index` (0 = least settled answer).
    pub fn option_score(&self, index: usize) -> u8 {
        let level = index as u8 + 1;
        match self {
            Variant::SelfAssessment => level * 25,
            Variant::Admin => level,
        }
    }

    pub fn accepts(&self, score: u8) -> bool {
        match self {
            Variant::SelfAssessment => matches!(score, 25 | 50 | 75 | 100),
            Variant::Admin => (1..=4).contains(&score),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = CoachError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "self" => Ok(Variant::SelfAssessment),
            "admin" => Ok(Variant::Admin),
            other => Err(CoachError::UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug)]
pub struct Question {
    pub id: &'static str,
    pub prompt: &'static str,
    /// Ordered from least to most settled self-regulation.
    pub options: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOption {
    pub text: &'static str,
    pub score: u8,
}

impl Question {
    pub fn options(&self, variant: Variant) -> impl Iterator<Item = AnswerOption> + '_ {
        self.options
            .iter()
            .copied()
            .enumerate()
            .map(move |(index, text)| AnswerOption {
                text,
                score: variant.option_score(index),
            })
    }

    pub fn option(&self, variant: Variant, index: usize) -> Option<AnswerOption> {
        self.options(variant).nth(index)
    }
}

#[derive(Debug)]
pub struct Skill {
    pub id: &'static str,
    pub title: &'static str,
    pub questions: &'static [Question],
}

const HOW_OFTEN: &[&str] = &["Rarely", "Sometimes", "Often", "Almost always"];
const HOW_TRUE: &[&str] = &[
    "Not like me",
    "A bit like me",
    "Mostly like me",
    "Exactly like me",
];

static SKILLS: [Skill; 6] = [
    Skill {
        id: "self_worth",
        title: "Self-Worth",
        questions: &[
            Question {
                id: "sw_mistake",
                prompt: "After a bad game I still feel good about who I am.",
                options: HOW_OFTEN,
            },
            Question {
                id: "sw_compare",
                prompt: "I can watch teammates do well without feeling worse about myself.",
                options: HOW_OFTEN,
            },
            Question {
                id: "sw_strengths",
                prompt: "I can name three things I am good at, on and off the pitch.",
                options: HOW_TRUE,
            },
            Question {
                id: "sw_selection",
                prompt: "Being left out of the starting team does not change how I see myself.",
                options: HOW_TRUE,
            },
        ],
    },
    Skill {
        id: "goal_setting",
        title: "Goal Setting",
        questions: &[
            Question {
                id: "gs_session",
                prompt: "I go into training with something specific I want to improve.",
                options: HOW_OFTEN,
            },
            Question {
                id: "gs_written",
                prompt: "I write my goals down or tell someone about them.",
                options: HOW_OFTEN,
            },
            Question {
                id: "gs_review",
                prompt: "After a match I check how I did against my goal.",
                options: HOW_OFTEN,
            },
            Question {
                id: "gs_control",
                prompt: "My goals are about things I can control, like effort and choices.",
                options: HOW_TRUE,
            },
        ],
    },
    Skill {
        id: "focus",
        title: "Focus & Concentration",
        questions: &[
            Question {
                id: "fo_noise",
                prompt: "I can block out shouting from the sideline.",
                options: HOW_OFTEN,
            },
            Question {
                id: "fo_refocus",
                prompt: "When my mind wanders I can bring it back to the game quickly.",
                options: HOW_OFTEN,
            },
            Question {
                id: "fo_routine",
                prompt: "I use a routine or cue word to switch on before kick-off.",
                options: HOW_OFTEN,
            },
            Question {
                id: "fo_next_action",
                prompt: "I think about the next action rather than the last one.",
                options: HOW_TRUE,
            },
        ],
    },
    Skill {
        id: "confidence",
        title: "Confidence",
        questions: &[
            Question {
                id: "co_ball",
                prompt: "I want the ball, even when the game is tight.",
                options: HOW_OFTEN,
            },
            Question {
                id: "co_new",
                prompt: "I try new skills in matches, not only in training.",
                options: HOW_OFTEN,
            },
            Question {
                id: "co_talk",
                prompt: "The way I talk to myself helps me play better.",
                options: HOW_TRUE,
            },
            Question {
                id: "co_stronger",
                prompt: "I believe I can compete against stronger opponents.",
                options: HOW_TRUE,
            },
        ],
    },
    Skill {
        id: "resilience",
        title: "Resilience",
        questions: &[
            Question {
                id: "re_bounce",
                prompt: "After a mistake I get straight back into the game.",
                options: HOW_OFTEN,
            },
            Question {
                id: "re_feedback",
                prompt: "I can hear criticism from my coach and use it.",
                options: HOW_OFTEN,
            },
            Question {
                id: "re_losing",
                prompt: "When we are losing I keep working as hard as at the start.",
                options: HOW_OFTEN,
            },
            Question {
                id: "re_setback",
                prompt: "I see setbacks as part of getting better.",
                options: HOW_TRUE,
            },
        ],
    },
    Skill {
        id: "emotional_control",
        title: "Emotional Control",
        questions: &[
            Question {
                id: "ec_referee",
                prompt: "I stay calm when a referee decision goes against us.",
                options: HOW_OFTEN,
            },
            Question {
                id: "ec_nerves",
                prompt: "I have a way to calm my nerves before a big game.",
                options: HOW_OFTEN,
            },
            Question {
                id: "ec_frustration",
                prompt: "I can feel frustrated without it changing how I play.",
                options: HOW_OFTEN,
            },
            Question {
                id: "ec_breathing",
                prompt: "I know how to use my breathing to reset.",
                options: HOW_TRUE,
            },
        ],
    },
];

pub fn skills() -> &'static [Skill] {
    &SKILLS
}

pub fn skill(id: &str) -> Option<&'static Skill> {
    SKILLS.iter().find(|skill| skill.id == id)
}

pub fn question(id: &str) -> Option<&'static Question> {
    SKILLS
        .iter()
        .flat_map(|skill| skill.questions)
        .find(|question| question.id == id)
}

pub fn question_count() -> usize {
    SKILLS.iter().map(|skill| skill.questions.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn bank_has_six_skills() {
        assert_eq!(skills().len(), 6);
        assert_eq!(question_count(), 24);
    }

    #[test]
    fn question_ids_are_unique_across_bank() {
        let ids: HashSet<_> = skills()
            .iter()
            .flat_map(|skill| skill.questions)
            .map(|question| question.id)
            .collect();
        assert_eq!(ids.len(), question_count());
    }

    #[test]
    fn option_scores_strictly_increase() {
        for variant in [Variant::SelfAssessment, Variant::Admin] {
            for question in skills().iter().flat_map(|skill| skill.questions) {
                let scores: Vec<u8> = question.options(variant).map(|o| o.score).collect();
                assert!(scores.windows(2).all(|pair| pair[0] < pair[1]));
                assert!(scores.iter().all(|score| variant.accepts(*score)));
            }
        }
    }

    #[test]
    fn variants_use_their_own_scale() {
        let question = question("co_ball").expect("question exists");
        let self_scores: Vec<u8> = question
            .options(Variant::SelfAssessment)
            .map(|o| o.score)
            .collect();
        let admin_scores: Vec<u8> = question.options(Variant::Admin).map(|o| o.score).collect();
        assert_eq!(self_scores, vec![25, 50, 75, 100]);
        assert_eq!(admin_scores, vec![1, 2, 3, 4]);
        assert!(question.option(Variant::Admin, 4).is_none());
    }

    #[test]
    fn variant_round_trips_through_str() {
        assert_eq!("self".parse::<Variant>().unwrap(), Variant::SelfAssessment);
        assert_eq!("admin".parse::<Variant>().unwrap(), Variant::Admin);
        assert!("coach".parse::<Variant>().is_err());
        assert_eq!(Variant::Admin.to_string(), "admin");
    }
}
