use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Ai,
    Candidate,
}

impl Speaker {
    fn label(&self) -> &'static str {
        match self {
            Speaker::Ai => "AI",
            Speaker::Candidate => "You",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: Speaker,
    pub text: String,
}

/// Ordered final utterances of one call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub utterances: Vec<Utterance>,
}

impl Transcript {
    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        self.utterances.push(Utterance { speaker, text });
    }

    pub fn is_empty(&self) -> bool {
        self.utterances.is_empty()
    }

    pub fn len(&self) -> usize {
        self.utterances.len()
    }

    pub fn render(&self) -> String {
        self.utterances
            .iter()
            .map(|u| format!("{}: {}", u.speaker.label(), u.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_speaker_prefixed_lines_and_skips_blank_text() {
        let mut transcript = Transcript::default();
        transcript.push(Speaker::Ai, "Tell me about yourself");
        transcript.push(Speaker::Candidate, "   ");
        transcript.push(Speaker::Candidate, "I am an engineer...");
        assert_eq!(transcript.len(), 2);
        assert_eq!(
            transcript.render(),
            "AI: Tell me about yourself\nYou: I am an engineer..."
        );
    }
}
