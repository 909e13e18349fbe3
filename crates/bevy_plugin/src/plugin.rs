/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use scriptable_core::runner::ScriptableActionRunner;
use scriptable_core::world::ScriptWorld;


/// Runs an Action on behalf of the Entity it is attached to.
///
/// Activated on the first frame it is seen, ticked every frame after that, and removed
/// once the Action completes.
#[derive(Component, Debug)]
pub struct RunningAction(pub ScriptableActionRunner);

impl RunningAction {
    pub fn new(runner: ScriptableActionRunner) -> Self {
        Self(runner)
    }
}


/// Written when a `RunningAction` completes, right before it gets removed.
#[derive(Message, Debug, Clone)]
pub struct ScriptableActionFinished {
    pub entity: Entity,
    pub action: String,
}


/// World-space location of an Entity, as seen by Conditions.
#[derive(Component, Reflect, Debug, Default, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct ScriptableLocation(pub Vec3);


/// A `ScriptWorld` over the ECS: every live Entity is a valid object, and located ones
/// expose their `ScriptableLocation`.
#[derive(SystemParam)]
pub struct ScriptableWorld<'w, 's> {
    objects: Query<'w, 's, Option<&'static ScriptableLocation>>,
}

impl ScriptWorld for ScriptableWorld<'_, '_> {
    fn object_location(&self, object: Entity) -> Option<Vec3> {
        self.objects.get(object).ok().flatten().map(|location| location.0)
    }

    fn is_object_valid(&self, object: Entity) -> bool {
        self.objects.contains(object)
    }
}


/// Activates new runners and ticks the active ones.
pub fn tick_running_actions(
    time: Res<Time>,
    mut commands: Commands,
    mut runners: Query<(Entity, &mut RunningAction)>,
    mut finished: MessageWriter<ScriptableActionFinished>,
) {
    let delta = time.delta_secs();

    for (entity, mut running) in runners.iter_mut() {
        let runner = &mut running.0;

        if !runner.is_active() && !runner.is_ready_to_destroy() {
            if let Err(_err) = runner.activate() {
                #[cfg(feature = "logging")]
                bevy::log::error!("Could not run action for {:?}: {}", entity, _err);
                commands.entity(entity).remove::<RunningAction>();
                continue;
            }
        } else {
            runner.tick(delta);
        }

        if runner.is_ready_to_destroy() {
            #[cfg(feature = "logging")]
            bevy::log::debug!("Action {:?} finished for {:?}", runner.action().name(), entity);

            finished.write(ScriptableActionFinished {
                entity,
                action: runner.action().name().to_string(),
            });
            commands.entity(entity).remove::<RunningAction>();
        }
    }
}


pub struct ScriptablePlugin;

impl Plugin for ScriptablePlugin {
    fn build(&self, app: &mut App) {
        app
        .register_type::<ScriptableLocation>()
        .add_message::<ScriptableActionFinished>()
        .add_systems(Update, tick_running_actions)
        ;
    }
}
