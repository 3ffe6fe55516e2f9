//! Report rendering and chunking.
//!
//! The table layout is a compatibility contract for readers that parse it:
//! columns Symbol, Status, SQN, Earnings; SQN and Earnings rounded to two
//! decimals; Symbol and Status left-aligned, numbers right-aligned.
//!
//! ```text
//! +--------+--------+------+----------+
//! | Symbol | Status |  SQN | Earnings |
//! +--------+--------+------+----------+
//! | AAPL   | BUY    | 1.50 |   120.00 |
//! +--------+--------+------+----------+
//! ```

use signaldesk_core::BacktestResult;

/// Channel payload limit the chunking heuristic aims to stay under.
///
/// Checked locally against the raw HTML text. The channel counts only the
/// text left after parsing entities, so a message that passes here always
/// fits there.
pub const MESSAGE_SIZE_LIMIT: usize = 4096;

/// Default rows per report part.
pub const CHUNK_ROWS: usize = 50;

const HEADERS: [&str; 4] = ["Symbol", "Status", "SQN", "Earnings"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

const ALIGN: [Align; 4] = [Align::Left, Align::Left, Align::Right, Align::Right];

// ─── Render ─────────────────────────────────────────────────────────

/// Formatted cells of one table row: symbol, status, SQN, earnings.
pub type RowCells = [String; 4];

/// Format each result's cells (two-decimal numbers).
pub fn render_cells(results: &[BacktestResult]) -> Vec<RowCells> {
    results
        .iter()
        .map(|r| {
            [
                r.symbol.clone(),
                r.status.name().to_string(),
                format!("{:.2}", r.sqn),
                format!("{:.2}", r.earnings),
            ]
        })
        .collect()
}

/// Render results as a bordered fixed-column table (no trailing newline).
pub fn render_table(results: &[BacktestResult]) -> String {
    table_from_cells(&render_cells(results))
}

/// Lay out pre-formatted rows. Column widths fit the widest cell.
pub fn table_from_cells(rows: &[RowCells]) -> String {
    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let border = border_line(&widths);
    let mut out = String::with_capacity((border.len() + 1) * (rows.len() + 4));
    out.push_str(&border);
    out.push('\n');
    out.push_str(&row_line(&HEADERS, &widths));
    out.push('\n');
    out.push_str(&border);
    for row in rows {
        out.push('\n');
        out.push_str(&row_line(row, &widths));
    }
    out.push('\n');
    out.push_str(&border);
    out
}

fn border_line(widths: &[usize; 4]) -> String {
    let mut line = String::from("+");
    for w in widths {
        line.push_str(&"-".repeat(w + 2));
        line.push('+');
    }
    line
}

fn row_line<S: AsRef<str>>(cells: &[S; 4], widths: &[usize; 4]) -> String {
    let mut line = String::from("|");
    for ((cell, width), align) in cells.iter().zip(widths).zip(ALIGN) {
        let cell = cell.as_ref();
        let pad = width.saturating_sub(cell.chars().count());
        line.push(' ');
        match align {
            Align::Left => {
                line.push_str(cell);
                line.push_str(&" ".repeat(pad));
            }
            Align::Right => {
                line.push_str(&" ".repeat(pad));
                line.push_str(cell);
            }
        }
        line.push_str(" |");
    }
    line
}

/// Escape text for inclusion in an HTML-formatted message.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ─── Chunks ─────────────────────────────────────────────────────────

/// A contiguous slice of the ranked list sent as one message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportChunk<'a> {
    pub strategy: &'a str,
    /// 1-based, sequential in rank order.
    pub part: usize,
    pub rows: &'a [BacktestResult],
}

impl ReportChunk<'_> {
    pub fn headline(&self) -> String {
        headline(self.strategy, self.part)
    }

    pub fn render_table(&self) -> String {
        render_table(self.rows)
    }

    /// Full HTML message: headline, blank line, preformatted table.
    pub fn message(&self) -> String {
        format_message(self.strategy, self.part, self.rows)
    }
}

/// Build the message text for one part without constructing a chunk.
pub fn format_message(strategy: &str, part: usize, rows: &[BacktestResult]) -> String {
    wrap_message(strategy, part, &render_table(rows))
}

/// Headline, blank line, then the HTML-escaped table in a `<pre>` block.
pub fn wrap_message(strategy: &str, part: usize, table: &str) -> String {
    format!(
        "{}\n\n<pre>{}</pre>",
        headline(strategy, part),
        escape_html(table)
    )
}

/// `<b>📊 {strategy} Backtest Results - Part {part} 📊</b>`
pub fn headline(strategy: &str, part: usize) -> String {
    format!(
        "<b>📊 {} Backtest Results - Part {part} 📊</b>",
        escape_html(strategy)
    )
}

/// Split `results` into parts of at most `max_rows` rows.
///
/// Produces `ceil(len / max_rows)` chunks; concatenating them reproduces the
/// input. A `max_rows` of zero is treated as one.
pub fn chunk_results<'a>(
    strategy: &'a str,
    results: &'a [BacktestResult],
    max_rows: usize,
) -> Vec<ReportChunk<'a>> {
    results
        .chunks(max_rows.max(1))
        .enumerate()
        .map(|(i, rows)| ReportChunk {
            strategy,
            part: i + 1,
            rows,
        })
        .collect()
}

/// How the ranked list is split into parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPolicy {
    /// Fixed row count per part. Assumes roughly uniform row width.
    RowCount { max_rows: usize },
    /// Grow each part row by row while the rendered message fits `max_chars`,
    /// never exceeding `max_rows`. Rows are never split: a row too wide on
    /// its own still gets its own part.
    ///
    /// `max_chars` is measured on the full HTML message, markup and escapes
    /// included, which overestimates the length the channel enforces.
    FitMessage { max_rows: usize, max_chars: usize },
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        ChunkPolicy::RowCount {
            max_rows: CHUNK_ROWS,
        }
    }
}

impl ChunkPolicy {
    pub fn split<'a>(
        &self,
        strategy: &'a str,
        results: &'a [BacktestResult],
    ) -> Vec<ReportChunk<'a>> {
        match *self {
            ChunkPolicy::RowCount { max_rows } => chunk_results(strategy, results, max_rows),
            ChunkPolicy::FitMessage {
                max_rows,
                max_chars,
            } => chunk_to_fit(strategy, results, max_rows.max(1), max_chars),
        }
    }
}

fn chunk_to_fit<'a>(
    strategy: &'a str,
    results: &'a [BacktestResult],
    max_rows: usize,
    max_chars: usize,
) -> Vec<ReportChunk<'a>> {
    let fits = |part: usize, rows: &[BacktestResult]| {
        format_message(strategy, part, rows).chars().count() <= max_chars
    };

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < results.len() {
        let part = chunks.len() + 1;
        let mut end = start + 1;
        while end < results.len() && end - start < max_rows && fits(part, &results[start..=end]) {
            end += 1;
        }
        if end - start == 1 && !fits(part, &results[start..end]) {
            tracing::warn!(
                strategy,
                part,
                symbol = %results[start].symbol,
                max_chars,
                "single row exceeds the message limit"
            );
        }
        chunks.push(ReportChunk {
            strategy,
            part,
            rows: &results[start..end],
        });
        start = end;
    }
    chunks
}
