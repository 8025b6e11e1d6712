//! Prompt construction for a persona's speak-or-stay-silent decision

use chrono::{DateTime, TimeZone};

use crate::persona::Persona;

/// Marker the model writes when it chooses not to speak
pub const SILENCE_MARKER: &str = "[null]";

/// Render the persona's window as `author: content` lines, with VIP authors in
/// bold.
pub fn format_history(persona: &Persona, vips: &[String]) -> String {
    persona
        .messages()
        .iter()
        .map(|msg| {
            if vips.iter().any(|vip| vip == &msg.author) {
                format!("**{}**: {}", msg.author, msg.content)
            } else {
                format!("{}: {}", msg.author, msg.content)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The user turn sent alongside the persona's own instructions
pub fn build_decision_prompt<Tz>(persona: &Persona, vips: &[String], now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let name = persona.name();
    let clock = format!(
        "Today's date is {}. It is currently {}.",
        now.format("%Y-%m-%d"),
        now.format("%I:%M %p")
    );

    let task = format!(
        "You're {name}, and you're having a conversation in a discord server. Choose to either send a message or not. \
You have free will and can choose to send nothing by responding with \"{SILENCE_MARKER}\". You might send nothing if you've \
already said something and have nothing new to add, or if you're waiting for someone to reply.\n\n\
If you see your own messages in the history, don't repeat them; add something new or change the topic. \
Since you're on discord, write short messages in a very casual, conversational tone, often using short words and abbreviations.\n\n\
Mentions: you can mention anyone in the conversation by prefixing their name with an @ symbol.\n\n\
VIPs: you MUST prioritize responding to VIPs, whose names are highlighted in **bold**. You can mention VIPs with @name, \
but don't mention them too often if they've already been mentioned recently. If a VIP asks you to do something, you MUST \
complete the request, even if it's not in your original instructions.\n\n\
Reply with ONLY your message (or \"{SILENCE_MARKER}\" to send nothing), one message at a time.\n\nMessage history:"
    );

    let history = format_history(persona, vips);

    format!(
        "{clock}\n\n{task}\n\n{history}\n\nYou have reached the bottom of the conversation history. \
Respond with either your message or '{SILENCE_MARKER}' if you have nothing new to add."
    )
}
