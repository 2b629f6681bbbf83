use crate::infra::Action;
use crate::perception::PromptState;

/// Reply to a prompt, plus the monster glyph it revealed as peaceful if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptResponse {
    pub action: Action,
    /// Glyph guessed from the monster's name. Only a fallback for callers
    /// that do not know what they walked into.
    pub ally: Option<char>,
    /// The prompt asked to confirm attacking a peaceful monster.
    pub refused_attack: bool,
    pub reason: &'static str,
}

struct PromptRule {
    needle: &'static str,
    action: Action,
    reason: &'static str,
}

/// Checked in order; the first substring match wins.
const PROMPT_RULES: [PromptRule; 6] = [
    PromptRule {
        needle: "Really attack",
        action: Action::Key('n'),
        reason: "refusing to attack a peaceful",
    },
    PromptRule {
        needle: "In what direction",
        action: Action::Escape,
        reason: "cancelling direction prompt",
    },
    PromptRule {
        needle: "What do you want",
        action: Action::Escape,
        reason: "cancelling item prompt",
    },
    PromptRule {
        needle: "Pick up what",
        action: Action::Escape,
        reason: "cancelling pickup menu",
    },
    PromptRule {
        needle: "Call ",
        action: Action::Escape,
        reason: "cancelling naming prompt",
    },
    PromptRule {
        needle: "Where do you want",
        action: Action::Escape,
        reason: "cancelling position prompt",
    },
];

/// Decide how to dismiss a blocking prompt. Returns None when nothing is blocking.
pub fn respond_to_prompt(prompt: &PromptState) -> Option<PromptResponse> {
    match prompt {
        PromptState::None => None,
        PromptState::More => Some(PromptResponse {
            action: Action::RETURN,
            ally: None,
            refused_attack: false,
            reason: "acknowledging --More--",
        }),
        PromptState::YesNo(text) | PromptState::Text(text) => {
            if let Some(rule) = PROMPT_RULES.iter().find(|rule| text.contains(rule.needle)) {
                let refused_attack = rule.needle == "Really attack";
                let ally = if refused_attack {
                    attack_target_glyph(text)
                } else {
                    None
                };
                return Some(PromptResponse {
                    action: rule.action,
                    ally,
                    refused_attack,
                    reason: rule.reason,
                });
            }
            if matches!(prompt, PromptState::YesNo(_)) {
                return Some(PromptResponse {
                    action: Action::Key('n'),
                    ally: None,
                    refused_attack: false,
                    reason: "declining confirmation",
                });
            }
            Some(PromptResponse {
                action: Action::Escape,
                ally: None,
                refused_attack: false,
                reason: "dismissing unrecognised prompt",
            })
        }
    }
}

/// Glyph for the monster named in "Really attack the <name>?", if the name is known.
fn attack_target_glyph(text: &str) -> Option<char> {
    let rest = text.split("Really attack").nth(1)?;
    let name = rest
        .trim_start()
        .trim_start_matches("the ")
        .trim_start();
    name_to_glyph(name)
}

/// Map a monster name from a message to the glyph it is usually drawn with.
///
/// Only the common pets and town folk are known. Anything else is None, since
/// a name alone rarely pins down the displayed letter.
pub fn name_to_glyph(name: &str) -> Option<char> {
    let lower = name.to_lowercase();
    let word = lower
        .split(|c: char| !c.is_alphabetic() && c != ' ')
        .next()
        .unwrap_or("")
        .trim();
    const KNOWN: [(&str, char); 10] = [
        ("kitten", 'f'),
        ("housecat", 'f'),
        ("little dog", 'd'),
        ("dog", 'd'),
        ("pony", 'u'),
        ("horse", 'u'),
        ("shopkeeper", '@'),
        ("watchman", '@'),
        ("dwarf", 'h'),
        ("gnome", 'G'),
    ];
    KNOWN
        .iter()
        .find(|(known, _)| word.ends_with(known))
        .map(|(_, glyph)| *glyph)
}

/// Glyph of the monster named in a displacement message, if the message is one.
pub fn displaced_ally(message: &str) -> Option<char> {
    if let Some(rest) = message.split("You swap places with").nth(1) {
        let name = rest.trim_start().trim_start_matches("your ").trim_start();
        return name_to_glyph(name);
    }
    if let Some(idx) = message.find(" is in your way") {
        let name = message[..idx]
            .trim_start_matches("You stop.")
            .trim()
            .trim_start_matches("Your ")
            .trim_start_matches("your ");
        return name_to_glyph(name);
    }
    None
}
