use eframe::egui;

pub struct RemotePalette {
    pub bg: egui::Color32,
    pub fg: egui::Color32,
    pub stroke: egui::Color32,
    pub accent: egui::Color32,
    pub ready: egui::Color32,
    pub powered: egui::Color32,
    pub unavailable: egui::Color32,
    pub pad_background: egui::Color32,
    pub pad_handle: egui::Color32,
}

impl RemotePalette {
    pub fn new(is_dark: bool) -> Self {
        if is_dark {
            Self {
                bg: egui::Color32::from_rgb(25, 25, 25),
                fg: egui::Color32::WHITE,
                stroke: egui::Color32::WHITE,
                accent: egui::Color32::from_rgb(255, 200, 0),
                ready: egui::Color32::from_rgb(0, 200, 90),
                powered: egui::Color32::from_rgb(230, 190, 0),
                unavailable: egui::Color32::from_rgb(255, 80, 80),
                pad_background: egui::Color32::from_gray(60),
                pad_handle: egui::Color32::from_rgb(0, 200, 255),
            }
        } else {
            Self {
                bg: egui::Color32::from_rgb(245, 245, 245),
                fg: egui::Color32::BLACK,
                stroke: egui::Color32::BLACK,
                accent: egui::Color32::from_rgb(255, 220, 0),
                ready: egui::Color32::from_rgb(0, 200, 0),
                powered: egui::Color32::from_rgb(255, 200, 0),
                unavailable: egui::Color32::from_rgb(255, 50, 50),
                pad_background: egui::Color32::from_gray(210),
                pad_handle: egui::Color32::from_rgb(50, 50, 255),
            }
        }
    }
}

pub fn configure_style(ctx: &egui::Context, is_dark: bool) {
    let mut style = (*ctx.style()).clone();
    let palette = RemotePalette::new(is_dark);

    style
        .text_styles
        .iter_mut()
        .for_each(|(text_style, font_id)| {
            font_id.size = match text_style {
                egui::TextStyle::Heading => 24.0,
                egui::TextStyle::Body | egui::TextStyle::Button => 15.0,
                egui::TextStyle::Monospace => 13.0,
                _ => font_id.size,
            };
        });

    style.spacing.item_spacing = egui::vec2(10.0, 10.0);
    style.spacing.button_padding = egui::vec2(14.0, 8.0);

    let widgets = &mut style.visuals.widgets;
    widgets.noninteractive.bg_stroke = egui::Stroke::new(2.0, palette.stroke);
    widgets.noninteractive.fg_stroke = egui::Stroke::new(1.0, palette.fg);
    widgets.noninteractive.bg_fill = palette.bg;
    widgets.inactive.bg_stroke = egui::Stroke::new(2.0, palette.stroke);
    widgets.inactive.fg_stroke = egui::Stroke::new(1.0, palette.fg);
    widgets.hovered.bg_stroke = egui::Stroke::new(2.5, palette.stroke);
    widgets.hovered.bg_fill = palette.accent;
    widgets.hovered.fg_stroke = egui::Stroke::new(1.0, egui::Color32::BLACK);
    widgets.active.bg_stroke = egui::Stroke::new(3.0, palette.stroke);
    widgets.active.bg_fill = palette.ready;
    widgets.active.fg_stroke = egui::Stroke::new(1.0, egui::Color32::BLACK);
    for state in [
        &mut widgets.noninteractive,
        &mut widgets.inactive,
        &mut widgets.hovered,
        &mut widgets.active,
    ] {
        state.rounding = egui::Rounding::ZERO;
    }

    style.visuals.window_rounding = egui::Rounding::ZERO;
    style.visuals.window_stroke = egui::Stroke::new(2.0, palette.stroke);
    style.visuals.window_fill = palette.bg;
    style.visuals.panel_fill = palette.bg;
    style.visuals.override_text_color = Some(palette.fg);

    ctx.set_style(style);
}
