/// Text received from the robot, newest at the end.
///
/// Capped at `max_chars` bytes of UTF-8; the oldest characters are dropped first.
#[derive(Debug, Clone)]
pub struct Scrollback {
    text: String,
    max_chars: usize,
}

impl Scrollback {
    pub fn new(max_chars: usize) -> Self {
        Self {
            text: String::new(),
            max_chars: max_chars.max(1),
        }
    }

    pub fn append(&mut self, chunk: &str) {
        self.text.push_str(chunk);

        if self.text.len() > self.max_chars {
            let mut cut = self.text.len() - self.max_chars;
            while !self.text.is_char_boundary(cut) {
                cut += 1;
            }
            self.text.drain(..cut);
        }
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
