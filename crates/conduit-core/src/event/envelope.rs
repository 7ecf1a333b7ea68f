use serde::Serialize;

/// The single line written to the backend's stdin for each request.
///
/// Serializes as `{"type":"user","message":{"role":"user","content":...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct UserEnvelope<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    message: UserTurn<'a>,
}

#[derive(Debug, Clone, Serialize)]
struct UserTurn<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> UserEnvelope<'a> {
    pub fn new(prompt: &'a str) -> Self {
        Self {
            kind: "user",
            message: UserTurn {
                role: "user",
                content: prompt,
            },
        }
    }

    /// Encode as one newline-terminated line
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
