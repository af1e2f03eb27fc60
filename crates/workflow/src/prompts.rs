//! Prompt copy for each state.

use intake_config::ApplicationTypeConfig;
use intake_core::client::ClientSummary;
use intake_core::message::{Choice, Prompt};

use crate::session::ConversationSession;
use crate::state::State;
use crate::table::tokens;

fn cancel() -> Choice {
    Choice::new(tokens::CANCEL, "❌ Cancel")
}

/// Renders the prompt that belongs to a session's current state.
#[derive(Debug, Clone)]
pub struct PromptBook {
    types: Vec<ApplicationTypeConfig>,
}

impl PromptBook {
    pub fn new(types: &[ApplicationTypeConfig]) -> Self {
        Self {
            types: types.to_vec(),
        }
    }

    fn type_label<'a>(&'a self, code: &'a str) -> &'a str {
        self.types
            .iter()
            .find(|t| t.code.trim() == code)
            .map_or(code, |t| t.label.as_str())
    }

    pub fn for_session(&self, session: &ConversationSession) -> Prompt {
        let data = &session.data;
        match session.state {
            State::Idle => Prompt::info("👋 Intake desk. Start a new application?").with_choices(vec![
                Choice::new(tokens::NEW_APPLICATION, "📝 New application"),
            ]),

            State::SelectingSearchMethod => Prompt::info("🔎 How do you want to find the client?")
                .with_choices(vec![
                    Choice::new(tokens::SEARCH_PHONE, "📞 By phone"),
                    Choice::new(tokens::SEARCH_NAME, "👤 By name"),
                    Choice::new(tokens::SEARCH_ID, "🔢 By client ID"),
                    Choice::new(tokens::NEW_CLIENT, "➕ New client"),
                    cancel(),
                ]),

            State::EnteringClientPhone => {
                Prompt::info("📞 Enter the client's phone number.").with_choices(vec![cancel()])
            }
            State::EnteringClientName => {
                Prompt::info("👤 Enter the client's name.").with_choices(vec![cancel()])
            }
            State::EnteringClientId => {
                Prompt::info("🔢 Enter the client ID.").with_choices(vec![cancel()])
            }
            State::EnteringNewClientName => {
                Prompt::info("➕ Enter the new client's full name.").with_choices(vec![cancel()])
            }
            State::EnteringNewClientPhone => Prompt::info(format!(
                "📞 Enter the phone number for {}.",
                data.new_client.name.as_deref().unwrap_or("the new client")
            ))
            .with_choices(vec![cancel()]),

            State::SearchingClient => Prompt::info("⏳ Searching…"),

            State::ClientNotFound => {
                let query = data
                    .search_query()
                    .map(|q| q.to_string())
                    .unwrap_or_default();
                Prompt::info(format!("🤷 No client found for {query}."))
                    .with_choices(vec![
                        Choice::new(tokens::RETRY, "🔁 Try again"),
                        Choice::new(tokens::CREATE_CLIENT, "➕ Create client"),
                        Choice::new(tokens::SEARCH_AGAIN, "🔎 Other search"),
                        cancel(),
                    ])
            }

            State::ConfirmingClientSelection => {
                let Some(client) = &data.selected_client else {
                    return Prompt::error("No client selected.").with_choices(vec![cancel()]);
                };
                let total = data.candidates.len();
                let mut text = format!("Is this the client?\n\n{}", client_card(client));
                if total > 1 {
                    let position = data
                        .candidates
                        .iter()
                        .position(|c| c.id == client.id)
                        .map_or(1, |i| i + 1);
                    text.push_str(&format!("\n\nMatch {position} of {total}"));
                }
                let mut choices = vec![Choice::new(tokens::CONFIRM, "✅ Yes")];
                if total > 1 {
                    choices.push(Choice::new(tokens::NEXT_MATCH, "➡️ Next match"));
                }
                choices.push(Choice::new(tokens::SEARCH_AGAIN, "🔎 Search again"));
                choices.push(cancel());
                Prompt::info(text).with_choices(choices)
            }

            State::SelectingApplicationType => {
                let client = data
                    .selected_client
                    .as_ref()
                    .map(|c| format!("Client: {}\n\n", c.name))
                    .unwrap_or_default();
                let mut choices: Vec<Choice> = self
                    .types
                    .iter()
                    .map(|t| Choice::new(tokens::application_type(t.code.trim()), t.label.clone()))
                    .collect();
                choices.push(cancel());
                Prompt::info(format!("{client}📋 Select the application type.")).with_choices(choices)
            }

            State::EnteringApplicationDetails => {
                Prompt::info("✍️ Describe the request.").with_choices(vec![cancel()])
            }

            State::ConfirmingApplication => {
                let client = data
                    .selected_client
                    .as_ref()
                    .map(client_card)
                    .unwrap_or_default();
                let ty = data
                    .application_type
                    .as_deref()
                    .map(|code| self.type_label(code))
                    .unwrap_or_default();
                let details = data.details.as_deref().unwrap_or_default();
                Prompt::info(format!(
                    "Please confirm the application:\n\n{client}\n\nType: {ty}\nDetails: {details}"
                ))
                .with_choices(vec![
                    Choice::new(tokens::CONFIRM, "✅ Confirm"),
                    Choice::new(tokens::EDIT_DETAILS, "✏️ Edit details"),
                    cancel(),
                ])
            }

            State::ApplicationCreated => Prompt::info(format!(
                "✅ Application created.\nRequest ID: {}",
                data.request_id.as_deref().unwrap_or("-")
            ))
            .with_choices(vec![
                Choice::new(tokens::NEW_APPLICATION, "📝 New application"),
                Choice::new(tokens::CANCEL, "🏠 Done"),
            ]),
        }
    }
}

fn client_card(client: &ClientSummary) -> String {
    let mut card = format!("👤 {} (ID {})\n📞 {}", client.name, client.id, client.phone);
    if let Some(address) = &client.address {
        card.push_str(&format!("\n📍 {address}"));
    }
    card
}

pub fn cancelled() -> Prompt {
    Prompt::info("Cancelled.")
}

pub fn client_created(client: &ClientSummary) -> Prompt {
    Prompt::info(format!("➕ Client {} created (ID {}).", client.name, client.id))
}

pub fn already_submitted(request_id: &str) -> Prompt {
    Prompt::info(format!(
        "This application was already submitted.\nRequest ID: {request_id}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> PromptBook {
        PromptBook::new(&intake_config::AppConfig::default().application_types)
    }

    fn client(id: i64, name: &str) -> ClientSummary {
        ClientSummary {
            id,
            name: name.into(),
            phone: "+998901234567".into(),
            address: None,
        }
    }

    #[test]
    fn data_entry_prompts_offer_cancel() {
        let book = book();
        for state in State::ALL.into_iter().filter(|s| s.is_data_entry()) {
            let mut session = ConversationSession::new(1);
            session.state = state;
            assert!(book.for_session(&session).offers("cancel"), "{state}");
        }
    }

    #[test]
    fn next_match_only_with_several_candidates() {
        let book = book();
        let mut session = ConversationSession::new(1);
        session.state = State::ConfirmingClientSelection;
        session.data.candidates = vec![client(1, "Aziz")];
        session.data.selected_client = Some(client(1, "Aziz"));
        assert!(!book.for_session(&session).offers("next_match"));

        session.data.candidates.push(client(2, "Aziza"));
        let prompt = book.for_session(&session);
        assert!(prompt.offers("next_match"));
        assert!(prompt.text.contains("Match 1 of 2"));
    }

    #[test]
    fn type_menu_uses_configured_labels() {
        let mut session = ConversationSession::new(1);
        session.state = State::SelectingApplicationType;
        let prompt = book().for_session(&session);
        assert!(prompt.offers("type:repair"));
        assert!(prompt.choices.iter().any(|c| c.label == "Repair"));
    }

    #[test]
    fn confirmation_summarizes_draft() {
        let mut session = ConversationSession::new(1);
        session.state = State::ConfirmingApplication;
        session.data.selected_client = Some(client(3, "Aziz Karimov"));
        session.data.application_type = Some("maintenance".into());
        session.data.details = Some("Annual boiler check".into());
        let text = book().for_session(&session).text;
        assert!(text.contains("Aziz Karimov"));
        assert!(text.contains("Type: Maintenance"));
        assert!(text.contains("Annual boiler check"));
    }
}
