//! Conversion between the OpenAI chat-completion shape and the native
//! `generateContent` shape.

use crate::generate_content::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Role,
    SafetySetting,
};
use crate::models::{ChatCompletionRequest, ContentPart, MessageContent};

/// Turn prepended when the conversation would otherwise open with the model.
pub const CONTEXT_PLACEHOLDER: &str = "(Context)";

/// Harm categories whose blocking is disabled on every request.
const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Build the native request for an OpenAI chat-completion request.
pub fn to_generate_content(request: &ChatCompletionRequest) -> GenerateContentRequest {
    let turns = request.messages.iter().filter_map(|message| {
        let text = flatten_content(message.content.as_ref());
        (!text.trim().is_empty()).then(|| (map_role(&message.role), text))
    });

    let mut contents = merge_turns(turns);
    if contents.first().is_some_and(|c| c.role != Role::User) {
        contents.insert(0, Content::text(Role::User, CONTEXT_PLACEHOLDER));
    }

    GenerateContentRequest {
        contents,
        generation_config: generation_config(request),
        safety_settings: safety_settings(),
    }
}

/// Flatten message content to plain text.
///
/// Text parts contribute their text, file parts a `--- 文件: <path> ---`
/// header followed by the file body, anything else an empty line.
pub fn flatten_content(content: Option<&MessageContent>) -> String {
    match content {
        None => String::new(),
        Some(MessageContent::Text(text)) => text.clone(),
        Some(MessageContent::Parts(parts)) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => text.clone(),
                ContentPart::FileContent { file_path, content } => {
                    format!("--- 文件: {file_path} ---\n{content}")
                }
                ContentPart::Other => String::new(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// `assistant` speaks as the model; every other role speaks as the user.
pub fn map_role(role: &str) -> Role {
    if role == "assistant" {
        Role::Model
    } else {
        Role::User
    }
}

/// Merge runs of same-role turns into one turn, joining texts with `\n`.
pub fn merge_turns(turns: impl IntoIterator<Item = (Role, String)>) -> Vec<Content> {
    let mut merged: Vec<(Role, Vec<String>)> = Vec::new();
    for (role, text) in turns {
        match merged.last_mut() {
            Some((last_role, texts)) if *last_role == role => texts.push(text),
            _ => merged.push((role, vec![text])),
        }
    }

    merged
        .into_iter()
        .map(|(role, texts)| Content::text(role, texts.join("\n")))
        .collect()
}

/// Sampling settings; each one is mapped only when the caller set it.
pub fn generation_config(request: &ChatCompletionRequest) -> GenerationConfig {
    GenerationConfig {
        max_output_tokens: request.max_tokens,
        temperature: request.temperature,
        top_p: request.top_p,
    }
}

pub fn safety_settings() -> Vec<SafetySetting> {
    SAFETY_CATEGORIES
        .iter()
        .map(|category| SafetySetting {
            category: (*category).to_string(),
            threshold: "BLOCK_NONE".to_string(),
        })
        .collect()
}

/// Text of the first candidate, parts concatenated. Empty when absent.
pub fn response_text(response: &GenerateContentResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|part| part.text.as_deref())
                .collect()
        })
        .unwrap_or_default()
}
