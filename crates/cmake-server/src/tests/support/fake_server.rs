//! Scripted stand-ins for `cmake -E server` built from POSIX shell.

use crate::config::ServerConfig;

const FRAME_FUNCTION: &str =
    "frame() { printf '%s\\n' '[== \"CMake Server\" ==[' \"$1\" ']== \"CMake Server\" ==]'; }";

const READ_COOKIE: &str =
    "cookie=$(printf '%s' \"$line\" | sed 's/.*\"cookie\":\"\\([^\"]*\\)\".*/\\1/')";

const READ_KIND: &str = "kind=$(printf '%s' \"$line\" | sed 's/.*\"type\":\"\\([^\"]*\\)\".*/\\1/')";

/// Builder for a shell script that plays the server side of the protocol.
///
/// Payload templates may contain `@COOKIE@` and `@TYPE@`, replaced with the
/// cookie and `type` of the request being answered. Templates must not
/// contain single quotes.
#[derive(Debug, Default)]
pub struct FakeServer {
    prelude: Vec<String>,
    arms: Vec<(String, Vec<String>)>,
    fallback: Option<Vec<String>>,
    ending: Option<String>,
}

impl FakeServer {
    /// A server that exits immediately without output.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Greets with the given `(major, minor)` versions.
    #[must_use]
    pub fn hello(self, versions: &[(u32, u32)]) -> Self {
        let listed: Vec<String> = versions
            .iter()
            .map(|(major, minor)| format!("{{\"major\":{major},\"minor\":{minor}}}"))
            .collect();
        self.emit(&format!(
            "{{\"type\":\"hello\",\"supportedProtocolVersions\":[{}]}}",
            listed.join(",")
        ))
    }

    /// Writes one framed payload before reading any request.
    #[must_use]
    pub fn emit(mut self, payload: &str) -> Self {
        self.prelude.push(format!("frame '{payload}'"));
        self
    }

    /// Writes a raw line, outside any frame.
    #[must_use]
    pub fn emit_raw(mut self, line: &str) -> Self {
        self.prelude.push(format!("printf '%s\\n' '{line}'"));
        self
    }

    /// Answers requests of type `kind` with the given payloads, in order.
    #[must_use]
    pub fn reply_to(mut self, kind: &str, templates: &[&str]) -> Self {
        self.arms.push((kind.to_owned(), frames(templates)));
        self
    }

    /// Exits as soon as a request of type `kind` arrives, without replying.
    #[must_use]
    pub fn exit_on(mut self, kind: &str) -> Self {
        self.arms
            .push((kind.to_owned(), vec![String::from("exit 0")]));
        self
    }

    /// Answers every request not matched by [`FakeServer::reply_to`].
    #[must_use]
    pub fn reply_to_each_request(mut self, templates: &[&str]) -> Self {
        self.fallback = Some(frames(templates));
        self
    }

    /// Reads and discards stdin until it closes.
    #[must_use]
    pub fn idle(mut self) -> Self {
        self.ending = Some(String::from("cat >/dev/null"));
        self
    }

    /// Ignores stdin and stays alive for `seconds`.
    #[must_use]
    pub fn linger(mut self, seconds: u32) -> Self {
        self.ending = Some(format!("exec sleep {seconds}"));
        self
    }

    /// The shell script this builder describes.
    #[must_use]
    pub fn script(&self) -> String {
        let mut lines = vec![FRAME_FUNCTION.to_owned()];
        lines.extend(self.prelude.iter().cloned());

        if !self.arms.is_empty() || self.fallback.is_some() {
            lines.push(String::from("while IFS= read -r line; do"));
            lines.push(String::from("  case \"$line\" in"));
            lines.push(String::from("    *'\"cookie\":\"'*)"));
            lines.push(format!("      {READ_COOKIE}"));
            lines.push(format!("      {READ_KIND}"));
            lines.push(String::from("      case \"$kind\" in"));
            for (kind, commands) in &self.arms {
                push_arm(&mut lines, kind, commands);
            }
            if let Some(commands) = &self.fallback {
                push_arm(&mut lines, "*", commands);
            }
            lines.push(String::from("      esac"));
            lines.push(String::from("      ;;"));
            lines.push(String::from("  esac"));
            lines.push(String::from("done"));
        }

        if let Some(ending) = &self.ending {
            lines.push(ending.clone());
        }
        lines.join("\n")
    }

    /// A server configuration running the script under `sh`.
    #[must_use]
    pub fn config(&self) -> ServerConfig {
        ServerConfig::new("sh").with_args([String::from("-c"), self.script()])
    }
}

fn frames(templates: &[&str]) -> Vec<String> {
    templates
        .iter()
        .map(|template| {
            format!(
                "frame \"$(printf '%s' '{template}' | sed -e \"s/@COOKIE@/$cookie/g\" -e \"s/@TYPE@/$kind/g\")\""
            )
        })
        .collect()
}

fn push_arm(lines: &mut Vec<String>, pattern: &str, commands: &[String]) {
    lines.push(format!("        {pattern})"));
    for command in commands {
        lines.push(format!("          {command}"));
    }
    lines.push(String::from("          ;;"));
}
