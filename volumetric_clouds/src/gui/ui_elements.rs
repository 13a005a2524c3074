use crate::cloud_params::{StepCount, UnitInterval};

pub fn drag_value_vec2(ui: &mut egui::Ui, v: &mut glam::Vec2) -> egui::Response {
    ui.horizontal(|ui| {
        ui.add(egui::DragValue::new(&mut v.x).speed(0.01))
            | ui.add(egui::DragValue::new(&mut v.y).speed(0.01))
    })
    .inner
}

pub fn drag_value_vec3(ui: &mut egui::Ui, v: &mut glam::Vec3) -> egui::Response {
    ui.horizontal(|ui| {
        ui.add(egui::DragValue::new(&mut v.x).speed(0.01))
            | ui.add(egui::DragValue::new(&mut v.y).speed(0.01))
            | ui.add(egui::DragValue::new(&mut v.z).speed(0.01))
    })
    .inner
}

pub fn drag_value_vec4(ui: &mut egui::Ui, v: &mut glam::Vec4) -> egui::Response {
    ui.horizontal(|ui| {
        ui.add(egui::DragValue::new(&mut v.x).speed(0.01))
            | ui.add(egui::DragValue::new(&mut v.y).speed(0.01))
            | ui.add(egui::DragValue::new(&mut v.z).speed(0.01))
            | ui.add(egui::DragValue::new(&mut v.w).speed(0.01))
    })
    .inner
}

/// Unbounded float, e.g. multipliers.
pub fn drag_value_f32(ui: &mut egui::Ui, v: &mut f32) -> egui::Response {
    ui.add(egui::DragValue::new(v).speed(0.01).max_decimals(4))
}

/// Slider over `[0, 1]`, written back through [`UnitInterval::set`] so it stays clamped.
pub fn unit_interval_slider(ui: &mut egui::Ui, value: &mut UnitInterval) -> egui::Response {
    let mut raw = value.get();
    let response = ui.add(egui::Slider::new(&mut raw, 0.0..=1.0));
    value.set(raw);
    response
}

/// Dragging stays within a sensible range, larger counts from config files are kept as they are.
pub fn step_count_drag(ui: &mut egui::Ui, steps: &mut StepCount) -> egui::Response {
    let mut raw = i32::try_from(steps.get()).unwrap_or(i32::MAX);
    let response = ui.add(
        egui::DragValue::new(&mut raw)
            .range(1..=256)
            .clamp_existing_to_range(false),
    );
    if response.changed() {
        steps.set(raw);
    }
    response
}

pub fn color_edit(ui: &mut egui::Ui, rgba: &mut [f32; 4]) -> egui::Response {
    ui.color_edit_button_rgba_unmultiplied(rgba)
}

pub fn row_with_default<T: Copy, R>(
    ui: &mut egui::Ui,
    label: &str,
    value: &mut T,
    default: T,
    f: impl FnOnce(&mut egui::Ui, &mut T) -> R,
) -> egui::InnerResponse<R> {
    ui.label(label);
    let response = with_default(ui, value, default, f);
    ui.end_row();
    response
}

pub fn with_default<T: Copy, R>(
    ui: &mut egui::Ui,
    value: &mut T,
    default: T,
    f: impl FnOnce(&mut egui::Ui, &mut T) -> R,
) -> egui::InnerResponse<R> {
    ui.horizontal(|ui| {
        if ui.small_button("↩").clicked() {
            *value = default;
        }
        f(ui, value)
    })
}
