//! Transition table — every legal `(state, event shape)` pair and what it does.
//!
//! The table is built once and checked for structural defects before the
//! engine accepts it, so a missing cancel rule or a text rule on a menu is a
//! construction error instead of a silently ignored branch.

use std::collections::HashMap;

use intake_config::ApplicationTypeConfig;
use intake_core::message::InboundEvent;

use crate::error::TableError;
use crate::session::{Field, SearchMethod};
use crate::state::{State, StateKind};

/// Action tokens understood by the engine.
pub mod tokens {
    pub const NEW_APPLICATION: &str = "new_application";
    pub const SEARCH_PHONE: &str = "search_phone";
    pub const SEARCH_NAME: &str = "search_name";
    pub const SEARCH_ID: &str = "search_id";
    pub const NEW_CLIENT: &str = "new_client";
    pub const CANCEL: &str = "cancel";
    pub const RETRY: &str = "retry";
    pub const CREATE_CLIENT: &str = "create_client";
    pub const CONFIRM: &str = "confirm";
    pub const NEXT_MATCH: &str = "next_match";
    pub const SEARCH_AGAIN: &str = "search_again";
    pub const EDIT_DETAILS: &str = "edit_details";
    /// Prefix of application type tokens: `type:<code>`
    pub const TYPE_PREFIX: &str = "type:";

    pub fn application_type(code: &str) -> String {
        format!("{TYPE_PREFIX}{code}")
    }
}

/// The part of an event the table is keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventShape {
    /// Any text; the value itself goes to the validator
    Text,
    Action(String),
}

impl EventShape {
    pub fn of(event: &InboundEvent) -> Self {
        match event {
            InboundEvent::Text(_) => Self::Text,
            InboundEvent::Action(token) => Self::Action(token.clone()),
        }
    }

    fn action(token: &str) -> Self {
        Self::Action(token.to_string())
    }
}

impl std::fmt::Display for EventShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Action(token) => write!(f, "action({token})"),
        }
    }
}

/// Where a successful capture leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum After {
    Goto(State),
    /// Look the client up with the collected query
    Search,
    /// Create the client from the collected draft
    CreateClient,
}

/// What a matched rule does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Validate text into `field`, then continue per `then`
    Capture { field: Field, then: After },
    Goto(State),
    ChooseSearch(SearchMethod),
    /// Begin a fresh workflow instance
    Start,
    Cancel,
    /// Back to the entry state of the current search method
    RetrySearch,
    /// Drop the current search and choose a method again
    SearchAgain,
    NextMatch,
    PickType(String),
    /// Guarded hand-off to the application submitter
    Submit,
    /// Re-acknowledge an already submitted application
    RepeatReceipt,
}

impl Rule {
    fn target(&self) -> Option<State> {
        match self {
            Rule::Goto(state) | Rule::Capture { then: After::Goto(state), .. } => Some(*state),
            Rule::ChooseSearch(method) => Some(method.entry_state()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransitionTable {
    rules: HashMap<(State, EventShape), Rule>,
    /// Action tokens per state, in declaration order
    actions: HashMap<State, Vec<String>>,
}

impl TransitionTable {
    /// Build and check a table from raw rules.
    pub fn from_rules(
        rules: impl IntoIterator<Item = (State, EventShape, Rule)>,
    ) -> Result<Self, TableError> {
        let mut table = Self {
            rules: HashMap::new(),
            actions: HashMap::new(),
        };

        for (state, shape, rule) in rules {
            if let Some(target) = rule.target().filter(|t| t.kind() == StateKind::Transient) {
                return Err(TableError::TargetsTransient {
                    state,
                    event: shape.to_string(),
                    target,
                });
            }
            if let EventShape::Action(token) = &shape {
                table.actions.entry(state).or_default().push(token.clone());
            }
            let event = shape.to_string();
            if table.rules.insert((state, shape), rule).is_some() {
                return Err(TableError::DuplicateRule { state, event });
            }
        }

        table.check()?;
        Ok(table)
    }

    /// The intake workflow, with one type token per configured application type.
    pub fn standard(types: &[ApplicationTypeConfig]) -> Result<Self, TableError> {
        use tokens::*;

        if types.is_empty() {
            return Err(TableError::NoApplicationTypes);
        }

        let act = EventShape::action;
        let mut rules = vec![
            (State::Idle, act(NEW_APPLICATION), Rule::Start),
            (State::SelectingSearchMethod, act(SEARCH_PHONE), Rule::ChooseSearch(SearchMethod::Phone)),
            (State::SelectingSearchMethod, act(SEARCH_NAME), Rule::ChooseSearch(SearchMethod::Name)),
            (State::SelectingSearchMethod, act(SEARCH_ID), Rule::ChooseSearch(SearchMethod::Id)),
            (State::SelectingSearchMethod, act(NEW_CLIENT), Rule::Goto(State::EnteringNewClientName)),
            (State::EnteringClientPhone, EventShape::Text, capture(Field::Phone, After::Search)),
            (State::EnteringClientName, EventShape::Text, capture(Field::Name, After::Search)),
            (State::EnteringClientId, EventShape::Text, capture(Field::ClientId, After::Search)),
            (
                State::EnteringNewClientName,
                EventShape::Text,
                capture(Field::NewClientName, After::Goto(State::EnteringNewClientPhone)),
            ),
            (
                State::EnteringNewClientPhone,
                EventShape::Text,
                capture(Field::NewClientPhone, After::CreateClient),
            ),
            (State::ClientNotFound, act(RETRY), Rule::RetrySearch),
            (State::ClientNotFound, act(CREATE_CLIENT), Rule::Goto(State::EnteringNewClientName)),
            (State::ClientNotFound, act(SEARCH_AGAIN), Rule::SearchAgain),
            (State::ConfirmingClientSelection, act(CONFIRM), Rule::Goto(State::SelectingApplicationType)),
            (State::ConfirmingClientSelection, act(NEXT_MATCH), Rule::NextMatch),
            (State::ConfirmingClientSelection, act(SEARCH_AGAIN), Rule::SearchAgain),
            (
                State::EnteringApplicationDetails,
                EventShape::Text,
                capture(Field::Details, After::Goto(State::ConfirmingApplication)),
            ),
            (State::ConfirmingApplication, act(CONFIRM), Rule::Submit),
            (State::ConfirmingApplication, act(EDIT_DETAILS), Rule::Goto(State::EnteringApplicationDetails)),
            (State::ApplicationCreated, act(CONFIRM), Rule::RepeatReceipt),
            (State::ApplicationCreated, act(NEW_APPLICATION), Rule::Start),
        ];

        for ty in types {
            let code = ty.code.trim();
            if code.is_empty() || code.contains(char::is_whitespace) {
                return Err(TableError::InvalidTypeCode(ty.code.clone()));
            }
            rules.push((
                State::SelectingApplicationType,
                EventShape::Action(application_type(code)),
                Rule::PickType(code.to_string()),
            ));
        }

        for state in State::ALL {
            if state.kind() != StateKind::Transient {
                rules.push((state, act(CANCEL), Rule::Cancel));
            }
        }

        Self::from_rules(rules)
    }

    pub fn lookup(&self, state: State, event: &InboundEvent) -> Option<&Rule> {
        self.rules.get(&(state, EventShape::of(event)))
    }

    /// Action tokens valid in `state`.
    pub fn actions(&self, state: State) -> &[String] {
        self.actions.get(&state).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn accepts_text(&self, state: State) -> bool {
        self.rules.contains_key(&(state, EventShape::Text))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn check(&self) -> Result<(), TableError> {
        for state in State::ALL {
            let has_text = self.accepts_text(state);
            let has_cancel = self
                .rules
                .contains_key(&(state, EventShape::action(tokens::CANCEL)));

            match state.kind() {
                StateKind::Transient => {
                    if self.rules.keys().any(|(s, _)| *s == state) {
                        return Err(TableError::RuleInTransientState(state));
                    }
                    continue;
                }
                StateKind::DataEntry if !has_text => {
                    return Err(TableError::MissingTextRule(state));
                }
                StateKind::Menu | StateKind::Terminal if has_text => {
                    return Err(TableError::TextInMenuState(state));
                }
                _ => {}
            }

            if !has_cancel {
                return Err(TableError::MissingCancel(state));
            }
        }
        Ok(())
    }
}

fn capture(field: Field, then: After) -> Rule {
    Rule::Capture { field, then }
}
