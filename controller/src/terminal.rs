use std::collections::BTreeMap;

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::{debug, warn};
use wol_common::{Button, Canvas};

const GLYPH_WIDTH: u32 = 6;

/// Text-mode stand-in for the OLED panel. Each baseline becomes one row and
/// finished frames go to the `display` log target when they change.
#[derive(Debug, Default)]
pub struct TerminalCanvas {
    rows: BTreeMap<u32, String>,
    last_frame: Vec<String>,
}

impl TerminalCanvas {
    pub fn frame(&self) -> &[String] {
        &self.last_frame
    }

    fn put(&mut self, x: u32, y: u32, text: &str) {
        let row = self.rows.entry(y).or_default();
        let column = (x / GLYPH_WIDTH) as usize;
        let width = row.chars().count();
        if width < column {
            row.extend(std::iter::repeat(' ').take(column - width));
        } else if width > 0 && column > 0 {
            row.push(' ');
        }
        row.push_str(text);
    }
}

impl Canvas for TerminalCanvas {
    fn clear_buffer(&mut self) {
        self.rows.clear();
    }

    fn draw_text(&mut self, x: u32, y: u32, text: &str) {
        self.put(x, y, text);
    }

    fn draw_box(&mut self, x: u32, y: u32, width: u32, _height: u32) {
        let cells = width.div_ceil(GLYPH_WIDTH) as usize;
        self.put(x, y, &"#".repeat(cells));
    }

    fn send_buffer(&mut self) {
        let frame: Vec<String> = self
            .rows
            .values()
            .map(|row| row.trim_end().to_string())
            .collect();
        if frame != self.last_frame {
            debug!(target: "display", "\n{}", frame.join("\n"));
            self.last_frame = frame;
        }
    }
}

pub fn parse_keys(line: &str) -> Vec<Button> {
    line.chars().filter_map(Button::from_key).collect()
}

/// Reads button presses from stdin, one or more keys per line.
pub fn spawn_button_reader() -> mpsc::UnboundedReceiver<Button> {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    for button in parse_keys(&line) {
                        if tx.send(button).is_err() {
                            return;
                        }
                    }
                }
                Ok(None) => {
                    debug!("stdin closed, buttons disabled");
                    return;
                }
                Err(err) => {
                    warn!("button input read failed: {err}");
                    return;
                }
            }
        }
    });

    rx
}
