//! Prompt templates for LLM-generated copy and daily questions.
//!
//! Provider-agnostic. Rendering only substitutes placeholders; the response
//! shape each template asks for is validated by the caller.

use crate::gateway::Message;

/// Rendered prompt ready for LLM.
#[derive(Debug, Clone)]
pub struct PromptInstance {
    pub template_slug: String,
    pub system: String,
    pub user: String,
}

impl PromptInstance {
    pub fn to_messages(&self) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(&self.user)]
    }
}

/// Escape XML special characters to prevent prompt injection via tag breaking.
fn escape_xml_chars(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// A prompt template with `{name}` placeholders.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub slug: &'static str,
    pub system: &'static str,
    pub user: &'static str,
}

impl PromptTemplate {
    /// Substitute placeholders. Values are escaped; unknown placeholders are left as-is.
    pub fn render(&self, vars: &[(&str, &str)]) -> PromptInstance {
        let fill = |text: &str| {
            vars.iter().fold(text.to_string(), |acc, (name, value)| {
                acc.replace(&format!("{{{name}}}"), &escape_xml_chars(value))
            })
        };

        PromptInstance {
            template_slug: self.slug.to_string(),
            system: fill(self.system).trim().to_string(),
            user: fill(self.user).trim().to_string(),
        }
    }
}

pub const COPY_PROMPT: PromptTemplate = PromptTemplate {
    slug: "copy_v1",
    system: r#"
You write short, warm commentary for a personality quiz called Soul Layer.
The quiz uses four symbolic axes: E (impulse), V (vision), Λ (structure), Ǝ (observation).
Respond with a single JSON object and nothing else:
{"comment": string, "advice": string, "affirm": string}
- comment: 100 to 250 characters describing the result.
- advice: 100 to 250 characters of gentle, concrete advice about {theme_focus}.
- affirm: one affirmation of 15 to 30 characters.
Never mention scores, numbers, or that you are an AI.
"#,
    user: r#"
<result>{target}</result>
<result_meaning>{target_meaning}</result_meaning>
<theme>{theme}</theme>
"#,
};

pub const QUESTION_PROMPT: PromptTemplate = PromptTemplate {
    slug: "daily_question_v1",
    system: r#"
You write one short daily question for a personality quiz called Soul Layer.
Each of the four answers must lean toward exactly one axis:
E (act on impulse), V (imagine possibilities), Λ (build a plan), Ǝ (step back and observe).
Respond with a single JSON object and nothing else:
{"question": string, "options": {"E": string, "V": string, "Λ": string, "Ǝ": string}}
- question: at most 80 characters, suited to the {slot} of the day.
- each option: at most 40 characters, written in the first person.
"#,
    user: r#"
<slot>{slot}</slot>
<theme>{theme}</theme>
"#,
};
