//! Smooth Unicode progress bar for the playback bar.

use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use wave_proto::format;
use wave_proto::protocol::Progress;

use crate::theme::{C_MUTED, C_PLAYING, C_SECONDARY};

const BLOCKS: [char; 9] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

/// Bar of `width` cells filled to `fraction` (0.0..=1.0) in eighths.
pub fn bar(fraction: f64, width: usize) -> String {
    let eighths = (fraction.clamp(0.0, 1.0) * width as f64 * 8.0) as usize;
    let full_blocks = eighths / 8;
    let partial = eighths % 8;

    let mut bar = String::with_capacity(width * 3);
    for _ in 0..full_blocks.min(width) {
        bar.push('█');
    }
    if full_blocks < width {
        bar.push(BLOCKS[partial]);
        for _ in (full_blocks + 1)..width {
            bar.push(' ');
        }
    }
    bar
}

/// `M:SS ▕████▍     ▏ M:SS`; the right label is blank until the duration
/// is known.
pub fn draw_progress(frame: &mut Frame, area: Rect, progress: &Progress) {
    if area.width < 4 || area.height == 0 {
        return;
    }

    let left_label = progress.label();
    let right_label = progress.duration_secs.map(format::clock).unwrap_or_default();
    let label_w = (left_label.len() + right_label.len() + 2) as u16;
    let bar_w = area.width.saturating_sub(label_w).max(4) as usize;

    let mut spans = vec![Span::styled(
        format!("{} ", left_label),
        Style::default().fg(C_SECONDARY),
    )];
    spans.push(Span::styled(
        bar(progress.fraction(), bar_w),
        Style::default().fg(C_PLAYING),
    ));
    if !right_label.is_empty() {
        spans.push(Span::styled(
            format!(" {}", right_label),
            Style::default().fg(C_MUTED),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_fill() {
        assert_eq!(bar(0.0, 4), "    ");
        assert_eq!(bar(1.0, 4), "████");
        assert_eq!(bar(0.5, 4), "██  ");
        // 1/16 of 4 cells = 2 eighths
        assert_eq!(bar(0.0625, 4), "▎   ");
        assert_eq!(bar(3.0, 2).chars().count(), 2);
    }
}
