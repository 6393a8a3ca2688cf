use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{
    core::{boost::BoostPlan, load::LoadProfile, shading::ShadingProfile, status::Status},
    quantity::{energy::WattHours, proportions::Percent},
};

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();
    table
}

pub fn build_boost_table(plan: &BoostPlan) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Hour", "PV", "Shade", "Load", "Net", "±SoC", "SoC"]);
    let min_state_of_charge = plan.trough().unwrap_or(Percent::ZERO);
    for step in &plan.steps {
        table.add_row(vec![
            Cell::new(format!("{:02}:00", step.hour)).add_attribute(Attribute::Dim),
            Cell::new(step.pv).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.0}%", step.shading * 100.0))
                .set_alignment(CellAlignment::Right)
                .add_attribute(Attribute::Dim),
            Cell::new(step.load).set_alignment(CellAlignment::Right),
            Cell::new(step.net).set_alignment(CellAlignment::Right).fg(
                if step.net >= WattHours::ZERO { Color::Green } else { Color::Red },
            ),
            Cell::new(format!("{:+.1}", step.delta.0)).set_alignment(CellAlignment::Right),
            Cell::new(step.state_of_charge).set_alignment(CellAlignment::Right).fg(
                if step.state_of_charge <= min_state_of_charge {
                    Color::DarkYellow
                } else {
                    Color::Reset
                },
            ),
        ]);
    }
    table
}

pub fn build_profiles_table(load: &LoadProfile, shading: &ShadingProfile) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Hour", "Load", "Shade"]);
    for (hour, (load, shading)) in load.iter().zip(shading.iter()).enumerate() {
        table.add_row(vec![
            Cell::new(format!("{hour:02}:00")).add_attribute(Attribute::Dim),
            Cell::new(load).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.0}%", shading * 100.0))
                .set_alignment(CellAlignment::Right)
                .fg(if shading > 0.0 { Color::DarkYellow } else { Color::Reset }),
        ]);
    }
    table
}

pub fn build_status_table(status: &Status) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Inverter", "Forecast", "Statistics", "Store", "Plant", "Device"]);
    table.add_row(vec![
        Cell::new(status.inverter).fg(status.inverter.color()),
        Cell::new(status.forecast).fg(status.forecast.color()),
        Cell::new(status.statistics).fg(status.statistics.color()),
        Cell::new(status.store).fg(status.store.color()),
        Cell::new(status.plant),
        Cell::new(status.device),
    ]);
    table
}
