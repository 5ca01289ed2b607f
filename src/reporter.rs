use std::io::{self, Write};
use std::sync::{Arc, Mutex};

const INFO_PREFIX: &str = "I: ";
const WARN_PREFIX: &str = "W: ";
const ERROR_PREFIX: &str = "E: ";

/// User facing output. Messages carry a one letter prefix so they can be
/// told apart from command bodies (tables, documents) in captured output.
pub struct Reporter {
    sink: Sink,
}

enum Sink {
    Stdio,
    Buffer(Arc<Mutex<Vec<u8>>>),
}

/// Read side of a buffered reporter
#[derive(Clone)]
pub struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Reporter {
    pub fn stdio() -> Self {
        Self { sink: Sink::Stdio }
    }

    /// Reporter writing everything, in order, to memory
    pub fn buffered() -> (Self, Captured) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                sink: Sink::Buffer(buf.clone()),
            },
            Captured(buf),
        )
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        self.stdout(&format!("{}{}", INFO_PREFIX, msg.as_ref()));
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        self.stderr(&format!("{}{}", WARN_PREFIX, msg.as_ref()));
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        self.stderr(&format!("{}{}", ERROR_PREFIX, msg.as_ref()));
    }

    /// Raw command output, no prefix
    pub fn print(&self, body: impl AsRef<str>) {
        self.stdout(body.as_ref());
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.sink, Sink::Stdio) && io::IsTerminal::is_terminal(&io::stdin())
    }

    fn stdout(&self, line: &str) {
        match &self.sink {
            Sink::Stdio => println!("{}", line),
            Sink::Buffer(buf) => append(buf, line),
        }
    }

    fn stderr(&self, line: &str) {
        match &self.sink {
            Sink::Stdio => eprintln!("{}", line),
            Sink::Buffer(buf) => append(buf, line),
        }
    }
}

fn append(buf: &Mutex<Vec<u8>>, line: &str) {
    let mut buf = buf.lock().unwrap_or_else(|e| e.into_inner());
    // writing to a Vec cannot fail
    let _ = writeln!(buf, "{}", line);
}
