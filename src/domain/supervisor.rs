//! Log supervisor for fault-tolerant actor management.
//!
//! Every log actor is spawned linked to a supervisor. When the actor fails,
//! the supervisor respawns it under the same registry name; the replacement
//! rebuilds its aggregate from the persisted event stream in `pre_start`, so
//! no committed mutation is lost. Graceful shutdown goes through the
//! supervisor too, so an intentional stop is never mistaken for a crash.

use crate::domain::actor::{actor_name, LogActor, LogActorArgs, LogMessage};
use async_trait::async_trait;
use ractor::{Actor, ActorCell, ActorProcessingErr, ActorRef, SupervisionEvent};
use tokio::sync::oneshot;

/// Messages for the log supervisor.
pub enum SupervisorMsg {
    /// Spawn a log actor under this supervisor. Replies once the actor is
    /// running and registered.
    Spawn(LogActorArgs, oneshot::Sender<Result<(), String>>),
    /// Stop the supervised actor and the supervisor itself, without a respawn.
    Shutdown,
}

/// The iteration log supervisor actor.
pub struct LogSupervisor;

impl LogSupervisor {
    async fn spawn_log_actor(
        supervisor: &ActorRef<SupervisorMsg>,
        args: LogActorArgs,
    ) -> Result<ActorRef<LogMessage>, ractor::SpawnErr> {
        let name = actor_name(&args.aggregate_id);
        let (actor, _handle) =
            LogActor::spawn_linked(Some(name), LogActor, args, supervisor.get_cell()).await?;
        Ok(actor)
    }
}

#[async_trait]
impl Actor for LogSupervisor {
    type Msg = SupervisorMsg;
    type State = Option<(LogActorArgs, ActorCell)>;
    type Arguments = ();

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        _args: (),
    ) -> Result<Self::State, ActorProcessingErr> {
        Ok(None)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        msg: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match msg {
            SupervisorMsg::Spawn(args, reply) => {
                match Self::spawn_log_actor(&myself, args.clone()).await {
                    Ok(actor) => {
                        *state = Some((args, actor.get_cell()));
                        let _ = reply.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e.to_string()));
                    }
                }
            }
            SupervisorMsg::Shutdown => {
                // Clear the respawn state first so the resulting termination
                // event is not treated as a failure.
                if let Some((_, cell)) = state.take() {
                    cell.stop(None);
                }
                myself.stop(None);
            }
        }
        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        myself: ActorRef<Self::Msg>,
        evt: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if matches!(
            evt,
            SupervisionEvent::ActorFailed(_, _) | SupervisionEvent::ActorTerminated(_, _, _)
        ) {
            if let Some((args, _)) = state.clone() {
                let actor = Self::spawn_log_actor(&myself, args.clone()).await?;
                tracing::warn!(
                    "log actor for {} went down; respawned from the event stream",
                    args.aggregate_id
                );
                *state = Some((args, actor.get_cell()));
            }
        }
        Ok(())
    }
}
