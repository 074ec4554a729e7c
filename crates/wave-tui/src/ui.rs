//! Rendering.  Reads `AppState`, never mutates it.

use chrono::Utc;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use wave_proto::format;
use wave_proto::protocol::PlayerState;
use wave_proto::track::{TrackCard, TrackRef};

use crate::action::Tab;
use crate::app_state::{AppState, GenreFocus, ListPane, PaneStatus};
use crate::theme::{
    style_accent, style_border, style_default, style_muted, style_playing, style_secondary,
    style_selected, C_BADGE, C_CHIP, C_ERROR, C_GENRE, C_LOADING, C_PRICE,
};
use crate::widgets::progress_bar::draw_progress;

pub fn draw(frame: &mut Frame, state: &AppState) {
    let area = frame.area();
    let player_h = if state.now_playing.track.is_some() { 4 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(player_h),
            Constraint::Length(1),
        ])
        .split(area);

    draw_header(frame, chunks[0], state);
    match state.tab {
        Tab::Search => draw_search(frame, chunks[1], state),
        Tab::Trending => draw_trending(frame, chunks[1], state),
        Tab::Genres => draw_genres(frame, chunks[1], state),
        Tab::Artist => draw_artist(frame, chunks[1], state),
        Tab::History => draw_history(frame, chunks[1], state),
    }
    if player_h > 0 {
        draw_player(frame, chunks[2], state);
    }
    draw_footer(frame, chunks[3], state);

    state.toasts.draw(frame, area);
    if state.confirm_clear {
        draw_confirm(frame, area);
    }
}

// ── chrome ────────────────────────────────────────────────────────────────────

fn draw_header(frame: &mut Frame, area: Rect, state: &AppState) {
    let mut spans = vec![Span::styled(" SOUNDWAVE ", style_accent()), Span::raw(" ")];
    for (i, tab) in Tab::ALL.iter().enumerate() {
        let style = if *tab == state.tab {
            style_selected()
        } else {
            style_secondary()
        };
        spans.push(Span::styled(format!(" {} {} ", i + 1, tab.title()), style));
        if *tab == Tab::History && state.history_count() > 0 {
            spans.push(Span::styled(
                format!("({})", state.history_count()),
                Style::default().fg(C_BADGE).add_modifier(Modifier::BOLD),
            ));
        }
        spans.push(Span::raw(" "));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_footer(frame: &mut Frame, area: Rect, state: &AppState) {
    let hints = if state.search_input.is_active() {
        "enter search · esc clear/leave"
    } else {
        match state.tab {
            Tab::Search => "/ type · ←→ chip · s run chip · enter play · space pause · ,/. seek · x close · q quit",
            Tab::Trending => "enter play · r reload · space pause · ,/. seek · x close · q quit",
            Tab::Genres => "enter open/close · ←→ column · esc close · space pause · q quit",
            Tab::Artist => "r reload · tab switch pane · q quit",
            Tab::History => "enter play · d remove · C clear all · space pause · q quit",
        }
    };
    frame.render_widget(Paragraph::new(Span::styled(hints, style_muted())), area);
}

fn pane_block(title: impl Into<String>, focused: bool) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(style_border(focused))
        .title(Span::styled(format!(" {} ", title.into()), style_default()))
}

fn status_line(status: &PaneStatus) -> Option<Line<'static>> {
    match status {
        PaneStatus::Idle | PaneStatus::Ready => None,
        PaneStatus::Loading => Some(Line::from(Span::styled(
            "Loading…",
            Style::default().fg(C_LOADING),
        ))),
        PaneStatus::Empty(msg) => Some(Line::from(Span::styled(msg.clone(), style_secondary()))),
        PaneStatus::Failed(msg) => Some(Line::from(Span::styled(
            msg.clone(),
            Style::default().fg(C_ERROR),
        ))),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.width() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for c in s.chars() {
        if out.width() + 1 >= max {
            break;
        }
        out.push(c);
    }
    out.push('…');
    out
}

// ── track lists ───────────────────────────────────────────────────────────────

fn play_marker(state: &AppState, track: &TrackRef) -> Span<'static> {
    if !state.is_current(track) {
        return Span::raw("  ");
    }
    match state.now_playing.state {
        PlayerState::Playing => Span::styled("▶ ", style_playing()),
        _ => Span::styled("⏸ ", style_playing()),
    }
}

fn card_item(state: &AppState, card: &TrackCard, width: usize) -> ListItem<'static> {
    let track = &card.track;
    let meta = format!(
        " {}  {}",
        format::duration_ms(card.duration_ms),
        format::price(card.price)
    );
    let text_w = width.saturating_sub(meta.width() + 4);
    let mut spans = vec![
        play_marker(state, track),
        Span::styled(truncate(&track.display(), text_w), style_default()),
    ];
    if !track.is_playable() {
        spans.push(Span::styled(" (no preview)", style_muted()));
    }
    spans.push(Span::styled(meta, Style::default().fg(C_PRICE)));
    ListItem::new(Line::from(spans))
}

fn draw_list<T>(
    frame: &mut Frame,
    area: Rect,
    block: Block<'static>,
    pane: &ListPane<T>,
    focused: bool,
    item: impl Fn(&T, usize) -> ListItem<'static>,
) {
    let inner_w = area.width.saturating_sub(2) as usize;
    if pane.items().is_empty() {
        let text = status_line(pane.status()).unwrap_or_default();
        frame.render_widget(
            Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
            area,
        );
        return;
    }

    let items: Vec<ListItem> = pane.items().iter().map(|t| item(t, inner_w)).collect();
    let mut list_state = ListState::default();
    if focused {
        list_state.select(Some(pane.selected_index()));
    }
    let list = List::new(items).block(block).highlight_style(style_selected());
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn draw_search(frame: &mut Frame, area: Rect, state: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(3),
        ])
        .split(area);

    state.search_input.draw(frame, chunks[0]);

    let mut chips = vec![Span::styled(" Try: ", style_muted())];
    for (i, chip) in state.chips.iter().enumerate() {
        let style = if i == state.chip_cursor && !state.search_input.is_active() {
            Style::default().fg(C_CHIP).add_modifier(Modifier::REVERSED)
        } else {
            Style::default().fg(C_CHIP)
        };
        chips.push(Span::styled(format!(" {} ", chip), style));
        chips.push(Span::raw(" "));
    }
    frame.render_widget(Paragraph::new(Line::from(chips)), chunks[1]);

    let info = if state.search_pending() {
        Span::styled(" Searching…", Style::default().fg(C_LOADING))
    } else {
        Span::styled(format!(" {}", state.search_info), style_secondary())
    };
    frame.render_widget(Paragraph::new(Line::from(info)), chunks[2]);

    draw_list(
        frame,
        chunks[3],
        pane_block("Results", !state.search_input.is_active()),
        &state.search,
        !state.search_input.is_active(),
        |card, w| card_item(state, card, w),
    );
}

fn draw_trending(frame: &mut Frame, area: Rect, state: &AppState) {
    draw_list(
        frame,
        area,
        pane_block("🔥 Trending Now", true),
        &state.trending,
        true,
        |track, w| {
            ListItem::new(Line::from(vec![
                play_marker(state, track),
                Span::styled(truncate(track.title(), w / 2), style_default()),
                Span::styled(format!("  {}", track.artist()), style_secondary()),
            ]))
        },
    );
}

fn draw_genres(frame: &mut Frame, area: Rect, state: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(22), Constraint::Min(20)])
        .split(area);

    let tiles_focused = state.genre_focus == GenreFocus::Tiles;
    let items: Vec<ListItem> = state
        .genres
        .iter()
        .map(|g| {
            let open = state.genre_selection.active() == Some(g.as_str());
            let marker = if open { "● " } else { "  " };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(C_GENRE)),
                Span::styled(format::capitalize(g), Style::default().fg(C_GENRE)),
            ]))
        })
        .collect();
    let mut list_state = ListState::default();
    list_state.select(Some(state.genre_cursor));
    frame.render_stateful_widget(
        List::new(items)
            .block(pane_block("Genres", tiles_focused))
            .highlight_style(style_selected()),
        chunks[0],
        &mut list_state,
    );

    match state.genre_selection.active() {
        Some(genre) => draw_list(
            frame,
            chunks[1],
            pane_block(format!("{} tracks", format::capitalize(genre)), !tiles_focused),
            &state.genre_tracks,
            !tiles_focused,
            |card, w| card_item(state, card, w),
        ),
        None => frame.render_widget(
            Paragraph::new(Span::styled("Pick a genre and press enter.", style_muted()))
                .block(pane_block("Tracks", false)),
            chunks[1],
        ),
    }
}

fn draw_artist(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = pane_block("Artist Spotlight", true);
    let Some(spotlight) = &state.spotlight else {
        let text = status_line(&state.spotlight_status)
            .unwrap_or_else(|| Line::from(Span::styled(state.featured_artist.clone(), style_muted())));
        frame.render_widget(Paragraph::new(text).block(block), area);
        return;
    };

    let mut lines = vec![
        Line::from(Span::styled(spotlight.artist_name.clone(), style_accent())),
        Line::from(Span::styled(spotlight.genre.clone(), Style::default().fg(C_GENRE))),
        Line::default(),
        Line::from(Span::styled(spotlight.blurb(), style_default())),
        Line::default(),
        Line::from(Span::styled("Discography", style_secondary().add_modifier(Modifier::BOLD))),
    ];
    for album in &spotlight.albums {
        lines.push(Line::from(vec![
            Span::styled("  ◦ ", style_muted()),
            Span::styled(album.title.clone(), style_default()),
        ]));
    }
    if !spotlight.art.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(spotlight.art.clone(), style_muted())));
    }
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn draw_history(frame: &mut Frame, area: Rect, state: &AppState) {
    let title = format!("Listening History · {}", format::songs_played(state.history_count()));
    let now = Utc::now();
    draw_list(
        frame,
        area,
        pane_block(title, true),
        &state.history,
        true,
        |entry, w| {
            let ago = format::time_ago(entry.played_at(), now);
            let text_w = w.saturating_sub(ago.width() + 6);
            ListItem::new(Line::from(vec![
                play_marker(state, entry.track()),
                Span::styled(truncate(&entry.track().display(), text_w), style_default()),
                Span::styled(format!("  🕒 {}", ago), style_muted()),
            ]))
        },
    );
}

// ── playback bar ──────────────────────────────────────────────────────────────

fn draw_player(frame: &mut Frame, area: Rect, state: &AppState) {
    let Some(track) = &state.now_playing.track else {
        return;
    };
    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(style_border(true));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(0)])
        .split(inner);

    let icon = match state.now_playing.state {
        PlayerState::Playing => Span::styled(" ▶ ", style_playing()),
        PlayerState::Paused => Span::styled(" ⏸ ", style_secondary()),
        PlayerState::Idle => Span::styled(" ■ ", style_muted()),
    };
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            icon,
            Span::styled(track.title().to_string(), style_default().add_modifier(Modifier::BOLD)),
            Span::styled(format!("  {}", track.artist()), style_secondary()),
        ])),
        rows[0],
    );
    draw_progress(frame, rows[1], &state.now_playing.progress);
}

// ── confirm overlay ───────────────────────────────────────────────────────────

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width - w) / 2,
        y: area.y + (area.height - h) / 2,
        width: w,
        height: h,
    }
}

fn draw_confirm(frame: &mut Frame, area: Rect) {
    let rect = centered(area, 52, 8);
    frame.render_widget(Clear, rect);
    let text = vec![
        Line::from(Span::styled("Clear Listening History?", style_accent())),
        Line::default(),
        Line::from(Span::styled(
            "This will remove all your played song records. This action cannot be undone.",
            style_default(),
        )),
        Line::default(),
        Line::from(vec![
            Span::styled("[y] Clear All", Style::default().fg(C_ERROR)),
            Span::raw("   "),
            Span::styled("[n] Cancel", style_secondary()),
        ]),
    ];
    frame.render_widget(
        Paragraph::new(text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(style_border(true)),
            ),
        rect,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};
    use wave_proto::config::Config;
    use wave_proto::history::HistoryEntry;

    fn render(state: &AppState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| draw(f, state)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<Vec<_>>()
            .join("")
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer title", 6), "a lon…");
    }

    #[test]
    fn test_history_badge_and_overlay() {
        let mut state = AppState::new(&Config::default());
        state.tab = Tab::History;
        state.set_history(vec![HistoryEntry::new(
            TrackRef::new("1", "Jai Ho", "A. R. Rahman", "", Some("https://p/1".into())),
            Utc::now(),
        )]);
        let screen = render(&state);
        assert!(screen.contains("History"));
        assert!(screen.contains("(1)"));
        assert!(screen.contains("Jai Ho"));
        assert!(screen.contains("Just now"));

        state.confirm_clear = true;
        assert!(render(&state).contains("Clear Listening History?"));
    }

    #[test]
    fn test_empty_history_message() {
        let mut state = AppState::new(&Config::default());
        state.tab = Tab::History;
        state.set_history(vec![]);
        assert!(render(&state).contains("No songs played yet."));
    }
}
