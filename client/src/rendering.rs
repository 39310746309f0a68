use crate::login::LoginForm;
use crate::roster::Roster;
use macroquad::prelude::*;
use shared::{parse_hex_color, PlayerRow, FIELD_HEIGHT, FIELD_WIDTH, PLAYER_SIZE};

pub const HEADER_HEIGHT: f32 = 40.0;
pub const SIDEBAR_WIDTH: f32 = 260.0;
pub const WINDOW_WIDTH: f32 = FIELD_WIDTH + SIDEBAR_WIDTH;
pub const WINDOW_HEIGHT: f32 = FIELD_HEIGHT + HEADER_HEIGHT;

const GRID_SIZE: f32 = 50.0;
const LABEL_FONT_SIZE: f32 = 12.0;
const LABEL_GAP: f32 = 5.0;
const LIST_ROW_HEIGHT: f32 = 22.0;

const BACKGROUND: Color = Color::new(0.102, 0.102, 0.102, 1.0);
const GRID: Color = Color::new(0.2, 0.2, 0.2, 1.0);
const PANEL: Color = Color::new(0.141, 0.141, 0.165, 1.0);
const MUTED: Color = Color::new(0.6, 0.6, 0.6, 1.0);

pub fn player_color(row: &PlayerRow) -> Color {
    match parse_hex_color(&row.color) {
        Some([r, g, b]) => Color::from_rgba(r, g, b, 255),
        None => WHITE,
    }
}

/// Baseline origin of a name label centered above the player's square.
pub fn label_origin(row: &PlayerRow, text_width: f32) -> (f32, f32) {
    let (cx, _) = row.center();
    (cx - text_width / 2.0, row.y - LABEL_GAP)
}

/// Sidebar line for one player: name with a marker for the local player, and the rounded position.
pub fn roster_line(row: &PlayerRow, is_local: bool) -> (String, String) {
    let name = if is_local {
        format!("{} (You)", row.name)
    } else {
        row.name.clone()
    };
    let position = format!("({}, {})", row.x.round() as i32, row.y.round() as i32);
    (name, position)
}

pub struct Renderer {
    origin_x: f32,
    origin_y: f32,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            origin_x: 0.0,
            origin_y: HEADER_HEIGHT,
        }
    }

    pub fn render_field(&mut self, roster: &Roster) {
        clear_background(PANEL);

        self.draw_header("Realtime Multiplayer Game", "Esc: leave game");
        self.draw_field_background();

        for player in roster.iter() {
            self.draw_player(player, roster.is_local(player.id));
        }

        if roster.is_empty() {
            self.draw_centered(
                "Waiting for players to join...",
                self.origin_y + FIELD_HEIGHT / 2.0,
                20.0,
                MUTED,
            );
        }

        self.draw_sidebar(roster);
    }

    pub fn render_login(&mut self, form: &LoginForm) {
        clear_background(PANEL);

        let center_y = WINDOW_HEIGHT / 2.0;
        self.draw_centered("Realtime Multiplayer Game", center_y - 120.0, 36.0, WHITE);
        self.draw_centered(
            "Enter your name to join the game! Use W/A/S/D keys to move around.",
            center_y - 80.0,
            18.0,
            MUTED,
        );

        let box_w = 320.0;
        let box_h = 40.0;
        let box_x = (WINDOW_WIDTH - box_w) / 2.0;
        let box_y = center_y - 40.0;
        draw_rectangle(box_x, box_y, box_w, box_h, BACKGROUND);
        draw_rectangle_lines(box_x, box_y, box_w, box_h, 2.0, WHITE);

        let text = if form.name().is_empty() {
            "Enter your nickname...".to_string()
        } else if form.is_busy() {
            form.name().to_string()
        } else {
            format!("{}_", form.name())
        };
        let text_color = if form.name().is_empty() { MUTED } else { WHITE };
        draw_text(&text, box_x + 12.0, box_y + 27.0, 24.0, text_color);

        let hint = if form.is_busy() {
            "Joining..."
        } else if form.can_submit() {
            "Press Enter to join"
        } else {
            "Type a name (2-20 characters)"
        };
        self.draw_centered(hint, box_y + box_h + 30.0, 20.0, WHITE);

        if let Some(error) = form.error() {
            self.draw_centered(error, box_y + box_h + 60.0, 20.0, RED);
        }

        self.draw_centered(
            "W - up   A - left   S - down   D - right",
            center_y + 120.0,
            18.0,
            MUTED,
        );
        self.draw_centered(
            "All movements are synchronized in real-time with other players!",
            center_y + 145.0,
            18.0,
            MUTED,
        );
    }

    pub fn render_loading(&mut self) {
        clear_background(PANEL);
        self.draw_centered("Loading game...", WINDOW_HEIGHT / 2.0, 28.0, WHITE);
    }

    pub fn render_error(&mut self, message: &str) {
        clear_background(PANEL);
        let center_y = WINDOW_HEIGHT / 2.0;
        self.draw_centered("Connection Error", center_y - 40.0, 32.0, RED);
        self.draw_centered(message, center_y, 18.0, WHITE);
        self.draw_centered("Press R to retry", center_y + 40.0, 20.0, MUTED);
    }

    fn draw_centered(&self, text: &str, y: f32, font_size: f32, color: Color) {
        let width = measure_text(text, None, font_size as u16, 1.0).width;
        draw_text(text, (WINDOW_WIDTH - width) / 2.0, y, font_size, color);
    }

    fn draw_header(&self, title: &str, hint: &str) {
        draw_rectangle(0.0, 0.0, WINDOW_WIDTH, HEADER_HEIGHT, PANEL);
        draw_text(title, 12.0, 27.0, 26.0, WHITE);

        let width = measure_text(hint, None, 18, 1.0).width;
        draw_text(hint, WINDOW_WIDTH - width - 12.0, 26.0, 18.0, MUTED);
    }

    fn draw_field_background(&self) {
        let (ox, oy) = (self.origin_x, self.origin_y);
        draw_rectangle(ox, oy, FIELD_WIDTH, FIELD_HEIGHT, BACKGROUND);

        let mut x = 0.0;
        while x <= FIELD_WIDTH {
            draw_line(ox + x, oy, ox + x, oy + FIELD_HEIGHT, 1.0, GRID);
            x += GRID_SIZE;
        }

        let mut y = 0.0;
        while y <= FIELD_HEIGHT {
            draw_line(ox, oy + y, ox + FIELD_WIDTH, oy + y, 1.0, GRID);
            y += GRID_SIZE;
        }
    }

    fn draw_player(&self, player: &PlayerRow, is_local: bool) {
        let (ox, oy) = (self.origin_x, self.origin_y);

        draw_rectangle(
            ox + player.x,
            oy + player.y,
            PLAYER_SIZE,
            PLAYER_SIZE,
            player_color(player),
        );

        if is_local {
            draw_rectangle_lines(
                ox + player.x - 1.0,
                oy + player.y - 1.0,
                PLAYER_SIZE + 2.0,
                PLAYER_SIZE + 2.0,
                2.0,
                WHITE,
            );
        }

        let width = measure_text(&player.name, None, LABEL_FONT_SIZE as u16, 1.0).width;
        let (lx, ly) = label_origin(player, width);
        draw_text(&player.name, ox + lx, oy + ly, LABEL_FONT_SIZE, WHITE);
    }

    fn draw_sidebar(&self, roster: &Roster) {
        let x = FIELD_WIDTH + 16.0;
        let mut y = HEADER_HEIGHT + 28.0;

        draw_rectangle(FIELD_WIDTH, HEADER_HEIGHT, SIDEBAR_WIDTH, FIELD_HEIGHT, PANEL);
        draw_text(
            &format!("Players Online ({})", roster.len()),
            x,
            y,
            22.0,
            WHITE,
        );
        y += 12.0;

        if roster.is_empty() {
            draw_text("No players online", x, y + 18.0, 18.0, MUTED);
        }

        // Leave room for the controls and stats below the list.
        let list_bottom = HEADER_HEIGHT + FIELD_HEIGHT - 140.0;
        for player in roster.iter() {
            if y + LIST_ROW_HEIGHT > list_bottom {
                draw_text("...", x, y + 16.0, 18.0, MUTED);
                break;
            }

            let (name, position) = roster_line(player, roster.is_local(player.id));
            draw_rectangle(x, y + 5.0, 12.0, 12.0, player_color(player));

            let name_color = if roster.is_local(player.id) {
                YELLOW
            } else {
                WHITE
            };
            draw_text(&name, x + 20.0, y + 16.0, 18.0, name_color);

            let width = measure_text(&position, None, 14, 1.0).width;
            draw_text(&position, WINDOW_WIDTH - width - 12.0, y + 15.0, 14.0, MUTED);
            y += LIST_ROW_HEIGHT;
        }

        let controls_y = list_bottom + 24.0;
        draw_text("Controls", x, controls_y, 20.0, WHITE);
        draw_text("W/A/S/D or arrows: move", x, controls_y + 22.0, 16.0, MUTED);
        draw_text("Esc: leave game", x, controls_y + 42.0, 16.0, MUTED);

        let stats_y = controls_y + 80.0;
        draw_text(
            &format!("Field Size: {} x {}px", FIELD_WIDTH, FIELD_HEIGHT),
            x,
            stats_y,
            16.0,
            MUTED,
        );
        draw_text(
            &format!("Players Online: {}", roster.len()),
            x,
            stats_y + 20.0,
            16.0,
            MUTED,
        );
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
