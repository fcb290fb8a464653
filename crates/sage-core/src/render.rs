//! Incremental code-fence rendering for streamed responses
//!
//! Response text arrives as arbitrarily fragmented chunks. A fence marker
//! (three consecutive backticks) may be split across chunk boundaries, so
//! detection runs as a per-character state machine that carries the length
//! of the current backtick run between calls. Feeding a response in any
//! fragmentation produces exactly the same output as feeding it whole.
//!
//! All backtick characters are structural markers and are stripped from
//! both rendered and stored text. This includes stray single backticks in
//! prose, matching the historical behavior of the assistant.

use std::io::{self, Write};

use crossterm::{
    queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
};

/// Colors applied to fenced code spans
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub code_fg: Color,
    pub code_bg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            code_fg: Color::Green,
            code_bg: Color::Black,
        }
    }
}

/// Re-assembles streamed fragments into styled terminal output while
/// reconstructing the exact plain text for history storage.
#[derive(Debug)]
pub struct StreamingRenderer {
    theme: Theme,
    /// Whether the cursor is inside an open code fence
    inside_code: bool,
    /// Consecutive backticks seen so far, carried across fragments (0..=2)
    run: u8,
    /// Unstyled text accumulated so far, backticks stripped
    plain: String,
    wrote_any: bool,
}

impl StreamingRenderer {
    /// Create a renderer for one response turn
    pub fn new(theme: Theme) -> Self {
        Self {
            theme,
            inside_code: false,
            run: 0,
            plain: String::new(),
            wrote_any: false,
        }
    }

    /// Whether the renderer is currently inside an unterminated code fence
    pub fn inside_code(&self) -> bool {
        self.inside_code
    }

    /// The plain text reconstructed so far
    pub fn plain_text(&self) -> &str {
        &self.plain
    }

    /// Render one fragment, emitting only the not-yet-rendered content.
    ///
    /// Never waits for more input than the fragment itself; a partial
    /// fence marker at the fragment edge is carried as state, not buffered
    /// text, because backticks are never emitted.
    pub fn push(&mut self, fragment: &str, out: &mut impl Write) -> io::Result<()> {
        let mut segment = String::new();
        for ch in fragment.chars() {
            if ch == '`' {
                self.run += 1;
                if self.run == 3 {
                    self.run = 0;
                    self.flush_segment(&mut segment, out)?;
                    self.inside_code = !self.inside_code;
                    if self.inside_code {
                        queue!(
                            out,
                            SetForegroundColor(self.theme.code_fg),
                            SetBackgroundColor(self.theme.code_bg)
                        )?;
                    } else {
                        queue!(out, ResetColor)?;
                    }
                    self.wrote_any = true;
                }
            } else {
                self.run = 0;
                segment.push(ch);
                self.plain.push(ch);
            }
        }
        self.flush_segment(&mut segment, out)?;
        out.flush()
    }

    /// End the turn: reset styling (even mid-fence) and return the full
    /// reconstructed plain text.
    pub fn finish(self, out: &mut impl Write) -> io::Result<String> {
        if self.wrote_any {
            queue!(out, ResetColor)?;
            out.flush()?;
        }
        Ok(self.plain)
    }

    fn flush_segment(&mut self, segment: &mut String, out: &mut impl Write) -> io::Result<()> {
        if !segment.is_empty() {
            queue!(out, Print(&segment))?;
            self.wrote_any = true;
            segment.clear();
        }
        Ok(())
    }
}

/// Style a complete string in one shot through the same state machine.
///
/// Used when re-displaying stored history, where whole responses are
/// available up front.
pub fn format_text(text: &str, theme: Theme) -> String {
    let mut buf = Vec::new();
    let mut renderer = StreamingRenderer::new(theme);
    // Vec<u8> writes cannot fail
    let _ = renderer.push(text, &mut buf);
    let _ = renderer.finish(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}
