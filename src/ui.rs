// src/ui.rs

use worldgate::engine_lib::anchor::{AnchorId, WorldId};
use worldgate::engine_lib::pose::Pose;
use worldgate::engine_lib::trigger::TriggerOutcome;

/// Snapshot of portal state shown in the overlay.
pub struct StatusInfo {
    pub current_world: Option<WorldId>,
    pub pending_load: Option<WorldId>,
    pub saved_pose: Option<Pose>,
    pub parallel_worlds: Vec<WorldId>,
    pub active_pair: Option<(AnchorId, AnchorId)>,
    pub live_targets: usize,
    pub last_trigger: TriggerOutcome,
    pub grounded: bool,
}

fn describe_outcome(outcome: &TriggerOutcome) -> String {
    match outcome {
        TriggerOutcome::Outside => "none".to_string(),
        TriggerOutcome::Filtered => "filtered by tag".to_string(),
        TriggerOutcome::Inert => "unlinked portal".to_string(),
        TriggerOutcome::Teleported(pose) => format!("teleported to {:.1}", pose.position),
        TriggerOutcome::SwitchRequested(world) => format!("switching to {}", world),
        TriggerOutcome::Absorbed => "absorbed".to_string(),
    }
}

pub fn build_ui(ctx: &egui::Context, status: &StatusInfo) {
    egui::Window::new("Portals")
        .anchor(egui::Align2::LEFT_TOP, egui::vec2(10.0, 10.0))
        .resizable(false)
        .show(ctx, |ui| {
            ui.vertical(|ui| {
                match status.current_world {
                    Some(world) => ui.label(format!("World: {}", world)),
                    None => ui.label("World: loading..."),
                };
                if let Some(pending) = status.pending_load {
                    ui.label(format!("Loading: {}", pending));
                }
                if !status.parallel_worlds.is_empty() {
                    let names: Vec<String> = status.parallel_worlds.iter().map(|w| w.to_string()).collect();
                    ui.label(format!("Parallel: {}", names.join(", ")));
                }
                match status.saved_pose {
                    Some(pose) => ui.label(format!("Saved pose: {:.1}", pose.position)),
                    None => ui.label("Saved pose: -"),
                };
                match status.active_pair {
                    Some((a, b)) => ui.label(format!("Spawned pair: {} <-> {}", a, b)),
                    None => ui.label("Spawned pair: -"),
                };
                ui.label(format!("Render targets: {}", status.live_targets));
                ui.label(format!("Last trigger: {}", describe_outcome(&status.last_trigger)));
                ui.label(if status.grounded { "On ground" } else { "Airborne" });
                ui.separator();

                ui.label("Controls:");
                ui.label("   W/A/S/D: Move");
                ui.label("   Space: Jump");
                ui.label("   Arrow Keys / Mouse: Look");
                ui.label("   E: Spawn portal pair");
                ui.label("   Escape: Grab/Ungrab Mouse Cursor");
            });
        });
}
