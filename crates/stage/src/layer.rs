use novella_common::{
    ActorDisplayState, PortraitPlacement, PositionSlot, RestoreError, Savable, SavableKind,
    StateBlob,
};
use serde::{Deserialize, Serialize};

/// Stage geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Number of placement slots, numbered from 0.
    pub slot_count: usize,
    /// Slot used for new actors and out-of-range requests.
    pub default_slot: usize,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            slot_count: 5,
            default_slot: 2,
        }
    }
}

/// The set of portraits currently on stage.
///
/// Actors are kept in first-appearance order; hidden actors stay in the list so
/// their last expression survives a later re-entry.
#[derive(Debug, Clone, Default)]
pub struct ActorLayer {
    config: StageConfig,
    actors: Vec<ActorDisplayState>,
    next_order: u32,
}

impl ActorLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StageConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    pub fn actor(&self, actor_id: &str) -> Option<&ActorDisplayState> {
        self.actors.iter().find(|a| a.actor_id == actor_id)
    }

    /// Every known actor, hidden ones included.
    pub fn actors(&self) -> &[ActorDisplayState] {
        &self.actors
    }

    /// Visible actors, bottom to top.
    pub fn visible_actors(&self) -> Vec<&ActorDisplayState> {
        let mut visible: Vec<_> = self.actors.iter().filter(|a| a.visible).collect();
        visible.sort_by_key(|a| a.draw_order);
        visible
    }

    /// Show `actor_id` with `expression` at the requested placement and raise it to the top.
    ///
    /// An empty expression keeps the previous one.
    pub fn update_portrait(&mut self, actor_id: &str, expression: &str, placement: PortraitPlacement) {
        let slot = match placement {
            PortraitPlacement::Slot(slot) if slot < self.config.slot_count => slot,
            PortraitPlacement::Slot(slot) => {
                tracing::warn!(actor_id, slot, "slot out of range, using default");
                self.config.default_slot
            }
            PortraitPlacement::KeepCurrent => match self.actor(actor_id) {
                Some(ActorDisplayState {
                    visible: true,
                    position: PositionSlot::Slot(current),
                    ..
                }) => usize::from(*current),
                _ => self.config.default_slot,
            },
        };
        let position = u8::try_from(slot).map_or(PositionSlot::Hidden, PositionSlot::Slot);
        let draw_order = self.raise();

        match self.actors.iter_mut().find(|a| a.actor_id == actor_id) {
            Some(actor) => {
                if !expression.is_empty() {
                    actor.expression = expression.to_string();
                }
                actor.position = position;
                actor.visible = true;
                actor.draw_order = draw_order;
            }
            None => self.actors.push(ActorDisplayState {
                actor_id: actor_id.to_string(),
                position,
                expression: expression.to_string(),
                visible: true,
                draw_order,
                focused: false,
            }),
        }
        tracing::debug!(actor_id, expression, slot, "portrait updated");
    }

    /// Hide one actor. Returns false if the actor was never on stage.
    pub fn hide_actor(&mut self, actor_id: &str) -> bool {
        let Some(actor) = self.actors.iter_mut().find(|a| a.actor_id == actor_id) else {
            tracing::warn!(actor_id, "hide requested for unknown actor");
            return false;
        };
        hide(actor);
        tracing::debug!(actor_id, "actor hidden");
        true
    }

    pub fn hide_all(&mut self) {
        self.actors.iter_mut().for_each(hide);
        tracing::debug!("all actors hidden");
    }

    /// Returns false if the actor is not visible.
    pub fn set_focus(&mut self, actor_id: &str, focused: bool) -> bool {
        match self
            .actors
            .iter_mut()
            .find(|a| a.actor_id == actor_id && a.visible)
        {
            Some(actor) => {
                actor.focused = focused;
                true
            }
            None => {
                tracing::warn!(actor_id, "focus requested for actor not on stage");
                false
            }
        }
    }

    /// Drop every actor, hidden or not.
    pub fn clear(&mut self) {
        self.actors.clear();
        self.next_order = 0;
    }

    fn raise(&mut self) -> u32 {
        let order = self.next_order;
        self.next_order = self.next_order.saturating_add(1);
        order
    }
}

fn hide(actor: &mut ActorDisplayState) {
    actor.visible = false;
    actor.focused = false;
    actor.position = PositionSlot::Hidden;
}

impl Savable for ActorLayer {
    fn kind(&self) -> SavableKind {
        SavableKind::Actors
    }

    fn capture(&self) -> StateBlob {
        StateBlob::Actors(self.actors.clone())
    }

    /// Replace the stage with the saved actors. Out-of-range slots fall back to the
    /// default slot rather than rejecting the whole stage.
    fn restore(&mut self, blob: StateBlob) -> Result<(), RestoreError> {
        let mut actors = match blob {
            StateBlob::Actors(actors) => actors,
            other => return Err(RestoreError::mismatch(SavableKind::Actors, &other)),
        };

        let default = u8::try_from(self.config.default_slot).unwrap_or(0);
        for actor in &mut actors {
            if let PositionSlot::Slot(slot) = actor.position {
                if usize::from(slot) >= self.config.slot_count {
                    tracing::warn!(actor_id = %actor.actor_id, slot, "saved slot out of range, using default");
                    actor.position = PositionSlot::Slot(default);
                }
            }
        }

        self.next_order = actors
            .iter()
            .map(|a| a.draw_order.saturating_add(1))
            .max()
            .unwrap_or(0);
        self.actors = actors;
        tracing::info!(
            actors = self.actors.len(),
            visible = self.visible_actors().len(),
            "actor layer restored"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_actor_goes_to_requested_slot() {
        let mut layer = ActorLayer::new();
        layer.update_portrait("hero", "happy", PortraitPlacement::Slot(0));
        let hero = layer.actor("hero").unwrap();
        assert_eq!(hero.position, PositionSlot::Slot(0));
        assert_eq!(hero.expression, "happy");
        assert!(hero.visible);
    }

    #[test]
    fn keep_current_uses_existing_slot_or_centre() {
        let mut layer = ActorLayer::new();
        layer.update_portrait("hero", "happy", PortraitPlacement::KeepCurrent);
        assert_eq!(layer.actor("hero").unwrap().position, PositionSlot::Slot(2));

        layer.update_portrait("hero", "happy", PortraitPlacement::Slot(4));
        layer.update_portrait("hero", "sad", PortraitPlacement::KeepCurrent);
        let hero = layer.actor("hero").unwrap();
        assert_eq!(hero.position, PositionSlot::Slot(4));
        assert_eq!(hero.expression, "sad");
    }

    #[test]
    fn out_of_range_slot_falls_back_to_default() {
        let mut layer = ActorLayer::new();
        layer.update_portrait("hero", "", PortraitPlacement::Slot(9));
        assert_eq!(layer.actor("hero").unwrap().position, PositionSlot::Slot(2));
    }

    #[test]
    fn empty_expression_keeps_previous() {
        let mut layer = ActorLayer::new();
        layer.update_portrait("hero", "angry", PortraitPlacement::Slot(1));
        layer.update_portrait("hero", "", PortraitPlacement::KeepCurrent);
        assert_eq!(layer.actor("hero").unwrap().expression, "angry");
    }

    #[test]
    fn latest_update_draws_on_top() {
        let mut layer = ActorLayer::new();
        layer.update_portrait("a", "", PortraitPlacement::Slot(0));
        layer.update_portrait("b", "", PortraitPlacement::Slot(1));
        layer.update_portrait("a", "", PortraitPlacement::KeepCurrent);
        let ids: Vec<_> = layer.visible_actors().iter().map(|a| a.actor_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn hide_and_focus() {
        let mut layer = ActorLayer::new();
        layer.update_portrait("a", "", PortraitPlacement::Slot(0));
        layer.update_portrait("b", "", PortraitPlacement::Slot(1));
        assert!(layer.set_focus("a", true));
        assert!(layer.hide_actor("a"));
        assert!(!layer.actor("a").unwrap().focused);
        assert!(!layer.set_focus("a", true));
        assert!(!layer.hide_actor("ghost"));

        layer.hide_all();
        assert!(layer.visible_actors().is_empty());
        // Re-entry with KeepCurrent lands in the centre.
        layer.update_portrait("b", "", PortraitPlacement::KeepCurrent);
        assert_eq!(layer.actor("b").unwrap().position, PositionSlot::Slot(2));
    }

    #[test]
    fn capture_restore_rebuilds_stage() {
        let mut layer = ActorLayer::new();
        layer.update_portrait("a", "smile", PortraitPlacement::Slot(0));
        layer.update_portrait("b", "frown", PortraitPlacement::Slot(3));
        layer.hide_actor("b");
        let blob = layer.capture();

        let mut other = ActorLayer::new();
        other.update_portrait("c", "", PortraitPlacement::Slot(1));
        other.restore(blob).unwrap();
        assert!(other.actor("c").is_none());
        assert_eq!(other.visible_actors().len(), 1);
        assert_eq!(other.actor("a").unwrap().expression, "smile");

        // New portraits still draw above restored ones.
        other.update_portrait("d", "", PortraitPlacement::Slot(4));
        assert_eq!(other.visible_actors().last().unwrap().actor_id, "d");
    }

    #[test]
    fn restore_clamps_saved_slots() {
        let mut layer = ActorLayer::new();
        let blob = StateBlob::Actors(vec![ActorDisplayState {
            actor_id: "a".into(),
            position: PositionSlot::Slot(200),
            expression: String::new(),
            visible: true,
            draw_order: 7,
            focused: false,
        }]);
        layer.restore(blob).unwrap();
        assert_eq!(layer.actor("a").unwrap().position, PositionSlot::Slot(2));
    }

    #[test]
    fn restore_rejects_wrong_blob() {
        let mut layer = ActorLayer::new();
        layer.update_portrait("a", "", PortraitPlacement::Slot(0));
        let err = layer
            .restore(StateBlob::Variables(Default::default()))
            .unwrap_err();
        assert!(matches!(err, RestoreError::TypeMismatch { .. }));
        assert_eq!(layer.actors().len(), 1);
    }
}
