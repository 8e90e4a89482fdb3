//! Markdown to ratatui text conversion for bot answers.

use pulldown_cmark::{Alignment, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
};
use unicode_width::UnicodeWidthStr;

/// Render a markdown answer as styled terminal text.
///
/// Covers CommonMark plus GFM tables and strikethrough. Links keep their
/// target after the link text; tables are laid out in aligned columns.
pub fn render(markdown: &str) -> Text<'static> {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let mut renderer = Renderer::default();
    for event in Parser::new_ext(markdown, options) {
        renderer.handle(event);
    }
    renderer.finish()
}

#[derive(Default)]
struct Renderer {
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    styles: Vec<Style>,
    // Next number per open list; `None` for bullet lists
    lists: Vec<Option<u64>>,
    // An item marker was emitted and its text has not started yet
    item_open: bool,
    quote_depth: usize,
    in_code_block: bool,
    link: Option<PendingLink>,
    table: Option<TableBuilder>,
}

struct PendingLink {
    url: String,
    text: String,
}

#[derive(Default)]
struct TableBuilder {
    alignments: Vec<Alignment>,
    header: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
}

impl Renderer {
    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) if self.in_code_block => {
                for line in text.lines() {
                    self.push_text(line, code_style());
                    self.flush();
                }
            }
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => {
                self.push_text(&text, self.style());
            }
            Event::Code(code) => {
                let style = self.style().patch(code_style());
                self.push_text(&code, style);
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(table) = self.table.as_mut() {
                    table.cell.push(' ');
                } else {
                    self.flush();
                }
            }
            Event::Rule => {
                self.start_block();
                self.push_text(&"─".repeat(24), Style::default().fg(Color::DarkGray));
                self.flush();
            }
            Event::FootnoteReference(label) => {
                self.push_text(&format!("[{}]", label), self.style());
            }
            Event::TaskListMarker(done) => {
                self.push_text(if done { "[x] " } else { "[ ] " }, self.style());
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if !self.item_open {
                    self.start_block();
                }
            }
            Tag::Heading { .. } => {
                self.start_block();
                self.styles.push(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
            }
            Tag::BlockQuote => {
                self.start_block();
                self.quote_depth += 1;
            }
            Tag::CodeBlock(kind) => {
                self.start_block();
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        self.push_text(&lang, Style::default().fg(Color::DarkGray));
                        self.flush();
                    }
                }
                self.in_code_block = true;
            }
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.start_block();
                } else {
                    self.flush();
                }
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.push_text(&format!("{}{}", "  ".repeat(depth), marker), Style::default());
                self.item_open = true;
            }
            Tag::Table(alignments) => {
                self.start_block();
                self.table = Some(TableBuilder {
                    alignments,
                    ..Default::default()
                });
            }
            Tag::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    table.cell.clear();
                }
            }
            Tag::Emphasis => self.push_modifier(Modifier::ITALIC),
            Tag::Strong => self.push_modifier(Modifier::BOLD),
            Tag::Strikethrough => self.push_modifier(Modifier::CROSSED_OUT),
            Tag::Link { dest_url, .. } => {
                self.styles.push(
                    self.style()
                        .fg(Color::Blue)
                        .add_modifier(Modifier::UNDERLINED),
                );
                self.link = Some(PendingLink {
                    url: dest_url.to_string(),
                    text: String::new(),
                });
            }
            Tag::Image { dest_url, .. } => {
                self.push_text(&format!("[image: {}]", dest_url), Style::default().fg(Color::DarkGray));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph | TagEnd::Item => self.flush(),
            TagEnd::Heading(_) => {
                self.styles.pop();
                self.flush();
            }
            TagEnd::BlockQuote => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            TagEnd::CodeBlock => {
                self.flush();
                self.in_code_block = false;
            }
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.styles.pop();
            }
            TagEnd::Link => {
                self.styles.pop();
                if let Some(link) = self.link.take() {
                    // Autolinks already show their target
                    if !link.url.is_empty() && link.url != link.text {
                        self.push_text(&format!(" ({})", link.url), Style::default().fg(Color::DarkGray));
                    }
                }
            }
            TagEnd::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    let cell = std::mem::take(&mut table.cell);
                    table.row.push(cell.trim().to_string());
                }
            }
            TagEnd::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    let header = if table.row.is_empty() {
                        table.rows.pop()
                    } else {
                        Some(std::mem::take(&mut table.row))
                    };
                    table.header = header;
                }
            }
            TagEnd::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    self.lines.extend(table.into_lines());
                }
            }
            _ => {}
        }
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_modifier(&mut self, modifier: Modifier) {
        self.styles.push(self.style().add_modifier(modifier));
    }

    fn push_text(&mut self, text: &str, style: Style) {
        if let Some(table) = self.table.as_mut() {
            table.cell.push_str(text);
            return;
        }
        if let Some(link) = self.link.as_mut() {
            link.text.push_str(text);
        }
        self.item_open = false;

        if self.spans.is_empty() && self.quote_depth > 0 {
            self.spans.push(Span::styled(
                "│ ".repeat(self.quote_depth),
                Style::default().fg(Color::DarkGray),
            ));
        }

        // Parser splits text at unmatched delimiters; keep equal styles in one span
        match self.spans.last_mut() {
            Some(last) if last.style == style => last.content.to_mut().push_str(text),
            _ => self.spans.push(Span::styled(text.to_string(), style)),
        }
    }

    fn flush(&mut self) {
        if !self.spans.is_empty() {
            self.lines.push(Line::from(std::mem::take(&mut self.spans)));
        }
    }

    /// Ends the current line and separates the next block with a blank line.
    fn start_block(&mut self) {
        self.flush();
        let after_text = self.lines.last().is_some_and(|line| !line.spans.is_empty());
        if after_text && self.lists.is_empty() {
            self.lines.push(Line::default());
        }
    }

    fn finish(mut self) -> Text<'static> {
        self.flush();
        Text::from(self.lines)
    }
}

impl TableBuilder {
    fn into_lines(self) -> Vec<Line<'static>> {
        let columns = self
            .header
            .iter()
            .chain(&self.rows)
            .map(Vec::len)
            .max()
            .unwrap_or(0);
        let mut widths = vec![0usize; columns];
        for row in self.header.iter().chain(&self.rows) {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.width());
            }
        }

        let mut lines = Vec::new();
        if let Some(header) = &self.header {
            lines.push(Line::from(Span::styled(
                self.format_row(header, &widths),
                Style::default().add_modifier(Modifier::BOLD),
            )));
            let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            lines.push(Line::from(Span::styled(
                rule.join("─┼─"),
                Style::default().fg(Color::DarkGray),
            )));
        }
        for row in &self.rows {
            lines.push(Line::from(self.format_row(row, &widths)));
        }
        lines
    }

    fn format_row(&self, row: &[String], widths: &[usize]) -> String {
        let last = widths.len().saturating_sub(1);
        let cells: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, width)| {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                let padding = width.saturating_sub(cell.width());
                let alignment = self.alignments.get(i).copied().unwrap_or(Alignment::None);
                let (left, right) = match alignment {
                    Alignment::Right => (padding, 0),
                    Alignment::Center => (padding / 2, padding - padding / 2),
                    Alignment::Left | Alignment::None => (0, padding),
                };
                // No trailing padding after the last column
                let right = if i == last { 0 } else { right };
                format!("{}{}{}", " ".repeat(left), cell, " ".repeat(right))
            })
            .collect();
        cells.join(" │ ")
    }
}

fn code_style() -> Style {
    Style::default().fg(Color::Green)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn all_lines(text: &Text) -> Vec<String> {
        text.lines.iter().map(line_text).collect()
    }

    #[test]
    fn test_plain_text_passes_through() {
        let text = render("Meenakshi visited 3 times.");
        assert_eq!(all_lines(&text), ["Meenakshi visited 3 times."]);
    }

    #[test]
    fn test_bold_span() {
        let text = render("There were **3** visits");
        let spans = &text.lines[0].spans;
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[1].content, "3");
        assert!(spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_italic_and_code() {
        let text = render("*steel* plant `id-7`");
        let spans = &text.lines[0].spans;
        assert_eq!(spans[0].content, "steel");
        assert!(spans[0].style.add_modifier.contains(Modifier::ITALIC));
        assert_eq!(spans[2].content, "id-7");
        assert_eq!(spans[2].style.fg, Some(Color::Green));
    }

    #[test]
    fn test_nested_emphasis() {
        let text = render("**total *3* visits**");
        assert_eq!(all_lines(&text), ["total 3 visits"]);
        let spans = &text.lines[0].spans;
        assert_eq!(spans[1].content, "3");
        assert!(spans[1].style.add_modifier.contains(Modifier::BOLD | Modifier::ITALIC));
        assert!(spans[0].style.add_modifier.contains(Modifier::BOLD));
        assert!(!spans[0].style.add_modifier.contains(Modifier::ITALIC));
    }

    #[test]
    fn test_bold_italic_run() {
        let text = render("***very*** important");
        assert_eq!(all_lines(&text), ["very important"]);
        let very = &text.lines[0].spans[0];
        assert_eq!(very.content, "very");
        assert!(very.style.add_modifier.contains(Modifier::BOLD | Modifier::ITALIC));
    }

    #[test]
    fn test_link_shows_text_and_target() {
        let text = render("See [the report](http://x/r) for **Meenakshi**");
        assert_eq!(all_lines(&text), ["See the report (http://x/r) for Meenakshi"]);
        let link = &text.lines[0].spans[1];
        assert_eq!(link.content, "the report");
        assert!(link.style.add_modifier.contains(Modifier::UNDERLINED));
    }

    #[test]
    fn test_autolink_not_repeated() {
        let text = render("<http://x/r>");
        assert_eq!(all_lines(&text), ["http://x/r"]);
    }

    #[test]
    fn test_unclosed_markers_are_literal() {
        let text = render("2 ** 3 and *oops");
        assert_eq!(all_lines(&text), ["2 ** 3 and *oops"]);
    }

    #[test]
    fn test_snake_case_is_not_italic() {
        let text = render("site_visit_id");
        assert_eq!(text.lines[0].spans.len(), 1);
        assert_eq!(line_text(&text.lines[0]), "site_visit_id");
    }

    #[test]
    fn test_heading_and_lists() {
        let text = render("## Summary\n\n- first\n- second\n\n3. third\n4. fourth");
        assert_eq!(
            all_lines(&text),
            ["Summary", "", "• first", "• second", "", "3. third", "4. fourth"]
        );
        assert!(text.lines[0].spans[0].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_nested_list_is_indented() {
        let text = render("- plants\n  - steel\n  - cement\n- offices");
        assert_eq!(all_lines(&text), ["• plants", "  • steel", "  • cement", "• offices"]);
    }

    #[test]
    fn test_fenced_code_is_verbatim() {
        let text = render("```\nlet **x** = 1;\n```\nafter");
        assert_eq!(all_lines(&text), ["let **x** = 1;", "", "after"]);
        assert_eq!(text.lines[0].spans[0].style.fg, Some(Color::Green));
    }

    #[test]
    fn test_table_columns_are_aligned() {
        let text = render("| name | visits |\n|---|---:|\n| Meenakshi | 3 |\n| Ravi | 12 |");
        assert_eq!(
            all_lines(&text),
            [
                "name      │ visits",
                "──────────┼───────",
                "Meenakshi │      3",
                "Ravi      │     12",
            ]
        );
        assert!(text.lines[0].spans[0].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_table_keeps_inline_text() {
        let text = render("| plant | note |\n|---|---|\n| **Tata** | `ok` |");
        assert_eq!(all_lines(&text)[2], "Tata  │ ok");
    }

    #[test]
    fn test_blank_lines_preserved() {
        let text = render("a\n\nb");
        assert_eq!(text.lines.len(), 3);
        assert!(text.lines[1].spans.is_empty());
    }

    #[test]
    fn test_blockquote_prefix() {
        let text = render("> quoted answer");
        assert_eq!(all_lines(&text), ["│ quoted answer"]);
    }
}
