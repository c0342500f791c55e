use std::collections::BTreeSet;

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NavState {
    Idle,
    Active,
    Answered,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NavButton {
    pub question: u32,
    pub state: NavState,
}

/// One question visible at a time, selected through numbered buttons.
#[derive(Debug, Clone)]
pub struct QuestionNavigator {
    count: u32,
    current: u32,
    answered: BTreeSet<u32>,
}

impl QuestionNavigator {
    /// `None` when the page has no questions to navigate.
    pub fn new(count: u32) -> Option<Self> {
        (count > 0).then(|| Self {
            count,
            current: 1,
            answered: BTreeSet::new(),
        })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn contains(&self, question: u32) -> bool {
        (1..=self.count).contains(&question)
    }

    pub fn select(&mut self, question: u32) -> bool {
        if !self.contains(question) {
            return false;
        }
        self.current = question;
        true
    }

    /// Marks `question` answered when `text` has content. An answer that was
    /// cleared afterwards keeps the mark.
    pub fn record_answer(&mut self, question: u32, text: &str) -> bool {
        if !self.contains(question) || text.trim().is_empty() {
            return false;
        }
        self.answered.insert(question)
    }

    pub fn is_answered(&self, question: u32) -> bool {
        self.answered.contains(&question)
    }

    pub fn buttons(&self) -> Vec<NavButton> {
        (1..=self.count)
            .map(|question| NavButton {
                question,
                state: if self.answered.contains(&question) {
                    NavState::Answered
                } else if question == self.current {
                    NavState::Active
                } else {
                    NavState::Idle
                },
            })
            .collect()
    }
}
