use std::process::ExitCode;

/// Outcome of a command: an exit status and an optional closing line.
#[derive(Debug)]
pub struct Exit {
    code: ExitCode,
    message: Option<String>,
}

impl Exit {
    pub fn success() -> Self {
        Self {
            code: ExitCode::SUCCESS,
            message: None,
        }
    }

    pub fn error() -> Self {
        Self {
            code: ExitCode::FAILURE,
            message: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Print the closing line, if any, and hand back the status.
    pub fn report(self) -> ExitCode {
        if let Some(message) = self.message {
            println!("{message}");
        }
        self.code
    }
}
