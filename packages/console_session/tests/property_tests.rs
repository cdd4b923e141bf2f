use proptest::prelude::*;

use console_session::input_line::{echo_markup, mask};
use console_session::markup;
use console_session::protocol::{self, ClientMessage, ClientMetadata, ServerMessage};
use console_session::{
    ConnectionId, ControllerConfig, Focus, SessionController, TransportEvent,
};

fn open_controller() -> (SessionController, ConnectionId) {
    let mut ctl = SessionController::new(ControllerConfig::new(ClientMetadata::new(
        "console/test (Linux)",
        "en-US",
    )));
    let connection = ConnectionId(1);
    ctl.handle(TransportEvent::Connecting {
        connection,
        attempt: 1,
    });
    ctl.handle(TransportEvent::Open { connection });
    ctl.take_outgoing();
    (ctl, connection)
}

fn deliver(ctl: &mut SessionController, connection: ConnectionId, msg: &ServerMessage) {
    let raw = serde_json::to_string(msg).unwrap();
    ctl.handle(TransportEvent::Message { connection, raw });
}

fn inputs(ctl: &mut SessionController) -> Vec<String> {
    ctl.take_outgoing()
        .into_iter()
        .filter_map(|out| match out.message {
            ClientMessage::Input { content } => Some(content),
            ClientMessage::Init(_) => None,
        })
        .collect()
}

// --- Replay ---

#[derive(Debug, Clone)]
enum Step {
    Output(String, String),
    Clear,
    /// A prompt answered straight away with the given value.
    Answered(String, String),
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => ("\\PC{0,20}", "[a-z-]{0,10}").prop_map(|(c, k)| Step::Output(c, k)),
        1 => Just(Step::Clear),
        2 => ("\\PC{0,12}", "\\PC{0,12}").prop_map(|(p, v)| Step::Answered(p, v)),
    ]
}

proptest! {
    #[test]
    fn replay_matches_model(steps in prop::collection::vec(arb_step(), 0..40)) {
        let (mut ctl, conn) = open_controller();
        let mut model: Vec<(String, String)> = Vec::new();

        for step in &steps {
            match step {
                Step::Output(content, class) => {
                    deliver(&mut ctl, conn, &ServerMessage::Output {
                        content: content.clone(),
                        class_name: class.clone(),
                    });
                    let class = if class.is_empty() { "line" } else { class.as_str() };
                    model.push((content.clone(), class.to_string()));
                }
                Step::Clear => {
                    deliver(&mut ctl, conn, &ServerMessage::Clear);
                    model.clear();
                }
                Step::Answered(prompt, value) => {
                    deliver(&mut ctl, conn, &ServerMessage::Prompt {
                        content: prompt.clone(),
                        is_password: false,
                    });
                    ctl.pending_mut().unwrap().insert_str(value);
                    prop_assert!(ctl.submit());
                    model.push((echo_markup(prompt, value), "line".to_string()));
                }
            }
        }

        let actual: Vec<(String, String)> = ctl
            .surface()
            .lines()
            .iter()
            .map(|l| (l.content.clone(), l.class_name.clone()))
            .collect();
        prop_assert_eq!(actual, model);
    }
}

// --- Input round trip ---

proptest! {
    #[test]
    fn input_reaches_the_wire_untouched(value in any::<String>()) {
        let (mut ctl, conn) = open_controller();
        deliver(&mut ctl, conn, &ServerMessage::Prompt {
            content: "> ".to_string(),
            is_password: false,
        });
        ctl.pending_mut().unwrap().insert_str(&value);
        ctl.submit();

        let sent = inputs(&mut ctl);
        prop_assert_eq!(sent.len(), 1);

        let wire = protocol::encode(&ClientMessage::Input { content: sent[0].clone() });
        let back: serde_json::Value = serde_json::from_str(&wire).unwrap();
        prop_assert_eq!(back["type"].as_str(), Some("input"));
        prop_assert_eq!(back["content"].as_str(), Some(value.as_str()));
    }

    #[test]
    fn decode_never_panics(raw in any::<String>()) {
        let _ = protocol::decode(&raw);
    }
}

// --- Masking ---

proptest! {
    #[test]
    fn password_echo_is_a_mask_of_equal_length(value in "\\PC{0,32}", mask_char in prop::sample::select(vec!['*', '•', '#'])) {
        let mut config = ControllerConfig::new(ClientMetadata::new("console/test", "en-US"));
        config.mask_char = mask_char;
        let mut ctl = SessionController::new(config);
        let conn = ConnectionId(1);
        ctl.handle(TransportEvent::Connecting { connection: conn, attempt: 1 });
        ctl.handle(TransportEvent::Open { connection: conn });
        ctl.take_outgoing();

        deliver(&mut ctl, conn, &ServerMessage::Prompt {
            content: "password: ".to_string(),
            is_password: true,
        });
        ctl.pending_mut().unwrap().insert_str(&value);
        prop_assert_eq!(
            ctl.pending().unwrap().display_value(mask_char),
            mask(&value, mask_char)
        );
        ctl.submit();

        let echo = markup::plain_text(&ctl.surface().lines()[0].content);
        let shown = echo.strip_prefix("password: ").unwrap();
        prop_assert_eq!(shown.chars().count(), value.chars().count());
        prop_assert!(shown.chars().all(|c| c == mask_char));

        prop_assert_eq!(inputs(&mut ctl), vec![value]);
    }
}

// --- Turn taking ---

#[derive(Debug, Clone)]
enum Event {
    Prompt,
    Output,
    Submit,
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![Just(Event::Prompt), Just(Event::Output), Just(Event::Submit)]
}

proptest! {
    #[test]
    fn at_most_one_prompt_and_one_input_per_prompt(events in prop::collection::vec(arb_event(), 0..60)) {
        let (mut ctl, conn) = open_controller();
        let mut accepted_prompts = 0usize;
        let mut sent = 0usize;

        for event in &events {
            match event {
                Event::Prompt => {
                    let was_pending = ctl.pending().is_some();
                    let before = ctl.surface().len();
                    deliver(&mut ctl, conn, &ServerMessage::Prompt {
                        content: "? ".to_string(),
                        is_password: false,
                    });
                    if was_pending {
                        prop_assert_eq!(ctl.surface().len(), before);
                    } else {
                        accepted_prompts += 1;
                    }
                }
                Event::Output => deliver(&mut ctl, conn, &ServerMessage::Output {
                    content: "out".to_string(),
                    class_name: "line".to_string(),
                }),
                Event::Submit => {
                    let was_pending = ctl.pending().is_some();
                    prop_assert_eq!(ctl.submit(), was_pending);
                }
            }
            sent += inputs(&mut ctl).len();
            prop_assert!(sent <= accepted_prompts);
            prop_assert_eq!(ctl.focus() == Focus::Input, ctl.pending().is_some());
        }
    }
}
