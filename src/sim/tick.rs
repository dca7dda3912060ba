//! Scheduled jobs
//!
//! Everything the scheduler runs is a `Job`. Dispatch steps motion
//! controllers, counts down to play and hands finished cars over to traffic.

use super::motion::{Controller, ControllerId, StepOutcome, Sweep};
use super::scene::{EntityId, Role};
use super::scheduler::{CallbackFault, Scheduler, TaskControl, TaskHandle};
use super::session::PlayerSlot;
use super::state::{GamePhase, World};
use crate::error::GameError;
use crate::surface::{Screen, Surface};

/// Work item stored in the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Step one motion controller
    Motion(ControllerId),
    /// One second of the pre-round countdown
    Countdown,
}

/// Scheduler dispatch for `Game::advance`
pub(super) fn run_job<S: Surface>(
    world: &mut World<S>,
    sched: &mut Scheduler<Job>,
    handle: TaskHandle,
    job: Job,
) -> Result<TaskControl, CallbackFault> {
    let control = match job {
        Job::Motion(id) => world.step_motion(sched, handle, id),
        Job::Countdown => world.count_down(sched, handle),
    };
    world.flush();
    control
}

impl<S: Surface> World<S> {
    fn step_motion(
        &mut self,
        sched: &mut Scheduler<Job>,
        handle: TaskHandle,
        id: ControllerId,
    ) -> Result<TaskControl, CallbackFault> {
        let car = match self.motions.get(id) {
            Some(Controller::Bounded(bounded)) => Some(bounded.entity),
            Some(_) => None,
            None => {
                sched.cancel(handle);
                return Err(CallbackFault(format!(
                    "controller {:?} is no longer registered",
                    id
                )));
            }
        };

        match self.motions.step(id, &mut self.scene, &mut self.rng) {
            Some(StepOutcome::Continue) => Ok(TaskControl::Continue),
            _ => {
                if self.finish_sweep == Some(id) {
                    self.finish_sweep = None;
                }
                for session in &mut self.sessions {
                    session.retain_animators(|other| other != id);
                }
                if let Some(car) = car {
                    self.complete_handoff(car);
                }
                Ok(TaskControl::Stop)
            }
        }
    }

    fn count_down(
        &mut self,
        sched: &mut Scheduler<Job>,
        handle: TaskHandle,
    ) -> Result<TaskControl, CallbackFault> {
        let GamePhase::Countdown(seconds) = self.phase else {
            sched.cancel(handle);
            self.countdown = None;
            return Err(CallbackFault(format!(
                "countdown fired while {}",
                self.phase.as_str()
            )));
        };

        let seconds = seconds.saturating_sub(1);
        if seconds == 0 {
            self.countdown = None;
            self.begin_play();
            Ok(TaskControl::Stop)
        } else {
            self.phase = GamePhase::Countdown(seconds);
            self.show(Screen::Countdown { seconds });
            Ok(TaskControl::Continue)
        }
    }

    /// Reveal both panels with their first questions
    pub(super) fn begin_play(&mut self) {
        for session in &mut self.sessions {
            session.generate_question(&mut self.rng);
        }
        self.phase = GamePhase::Playing;
        self.show(Screen::Playing);
        self.publish_panels(true);
        log::info!("Round started");
    }

    /// End the round: lock both sessions, send the cars off as traffic and
    /// sweep a fresh finish line down the road.
    pub(super) fn declare_winner(
        &mut self,
        sched: &mut Scheduler<Job>,
        winner: PlayerSlot,
    ) -> Result<(), GameError> {
        let mut score = 0;
        for session in &mut self.sessions {
            if session.slot == winner {
                score = session.score();
            }
            session.lock();
        }
        self.phase = GamePhase::Ended { winner };

        for car in self.scene.with_role(Role::Car) {
            self.retire_car(car);
        }

        let cells = self.rebuild_finish_line(sched);
        let sweep = Sweep::finish_line(cells, self.settings.line_step);
        let delay = self.settings.animation_delay_ms;
        self.finish_sweep = Some(self.start_motion(sched, Controller::Sweep(sweep), delay)?);

        log::info!("{} won with {}", winner.name(), score);
        self.show(Screen::Ended {
            winner: winner.name().to_string(),
            score,
        });
        Ok(())
    }

    /// Hand a car to the traffic loop, or queue it while a nudge still owns it
    fn retire_car(&mut self, car: EntityId) {
        if self.motions.driving(car, &self.scene).is_empty() {
            self.scene.retag(car, Role::Npc);
        } else {
            self.pending_retags.insert(car);
        }
    }

    /// Finish a queued handoff once the car's last nudge is done
    fn complete_handoff(&mut self, car: EntityId) {
        if self.pending_retags.contains(&car) && self.motions.driving(car, &self.scene).is_empty() {
            self.pending_retags.remove(&car);
            self.scene.retag(car, Role::Npc);
            log::debug!("Car {:?} joined traffic", car);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::sim::motion::MotionKind;
    use crate::sim::session::AnswerOutcome;
    use crate::sim::state::Game;
    use crate::surface::{RecordingSurface, SurfaceCommand};

    /// Answer `slot` correctly until it wins
    fn win(game: &mut Game<RecordingSurface>, slot: PlayerSlot) -> Vec<AnswerOutcome> {
        let mut outcomes = Vec::new();
        while game.phase() == GamePhase::Playing {
            let key = game.correct_key(slot);
            outcomes.push(game.key_press(key).unwrap().unwrap());
        }
        outcomes
    }

    fn ended_screens(game: &Game<RecordingSurface>) -> usize {
        game.surface()
            .commands
            .iter()
            .filter(|c| matches!(c, SurfaceCommand::Screen(Screen::Ended { .. })))
            .count()
    }

    #[test]
    fn test_twelfth_correct_answer_wins_once() {
        let mut game = Game::playing(3);
        let outcomes = win(&mut game, PlayerSlot::One);

        assert_eq!(outcomes.len(), 12);
        assert_eq!(outcomes[10], AnswerOutcome::Advanced { score: 11 });
        assert_eq!(outcomes[11], AnswerOutcome::Won { score: 12 });
        assert_eq!(
            game.phase(),
            GamePhase::Ended {
                winner: PlayerSlot::One
            }
        );
        assert_eq!(
            game.surface().screen(),
            Some(&Screen::Ended {
                winner: "Player 1".into(),
                score: 12
            })
        );
        for slot in PlayerSlot::ALL {
            assert!(game.session(slot).unwrap().is_locked());
        }

        // Further presses from either player are dropped
        let key = game.correct_key(PlayerSlot::Two);
        assert_eq!(game.key_press(key).unwrap(), None);
        assert_eq!(game.key_press('q').unwrap(), None);
        assert_eq!(ended_screens(&game), 1);
    }

    #[test]
    fn test_winning_car_joins_traffic_after_its_last_nudge() {
        let mut game = Game::playing(3);
        let winner = game.session(PlayerSlot::One).unwrap().car;
        let loser = game.session(PlayerSlot::Two).unwrap().car;
        win(&mut game, PlayerSlot::One);

        // The idle loser is handed over at once; the winner is still being nudged
        assert_eq!(game.scene().role(loser), Some(Role::Npc));
        assert_eq!(game.scene().role(winner), Some(Role::Car));

        // Twelve stacked nudges, ten 40ms steps each
        game.advance(400);
        assert_eq!(game.scene().role(winner), Some(Role::Npc));
        assert_eq!(game.scene().position(winner).unwrap().y, CAR_START_Y - 600.0);
        // Only the traffic loop drives it now
        assert_eq!(game.motions().driving(winner, game.scene()).len(), 1);

        game.advance(40);
        assert_eq!(
            game.scene().position(winner).unwrap().y,
            CAR_START_Y - 610.0
        );
    }

    #[test]
    fn test_finish_line_sweeps_off_the_field() {
        let mut game = Game::playing(3);
        let parked = game.scene().with_role(Role::FinishSegment);
        win(&mut game, PlayerSlot::Two);

        // A fresh line replaces the parked one
        let fresh = game.scene().with_role(Role::FinishSegment);
        assert_eq!(fresh.len(), 40);
        assert!(fresh.iter().all(|id| !parked.contains(id)));
        assert_eq!(game.motions().of_kind(MotionKind::Sweep).len(), 1);

        game.advance(40);
        let first = game.scene().position(fresh[0]).unwrap();
        assert_eq!(first, glam::Vec2::new(FINISH_LEFT_X, FINISH_PARKED_Y + 10.0));

        game.advance(5_000);
        assert_eq!(game.scene().count(Role::FinishSegment), 0);
        assert!(game.motions().of_kind(MotionKind::Sweep).is_empty());
    }

    #[test]
    fn test_replay_resets_the_round() {
        let mut game = Game::playing(3);
        let old_cars = [
            game.session(PlayerSlot::One).unwrap().car,
            game.session(PlayerSlot::Two).unwrap().car,
        ];
        // Leave a backward nudge in flight on player two
        let key = game.correct_key(PlayerSlot::Two);
        game.key_press(key).unwrap();
        game.advance(400);
        let key = game.wrong_key(PlayerSlot::Two);
        game.key_press(key).unwrap();
        win(&mut game, PlayerSlot::One);

        game.replay().unwrap();
        assert_eq!(game.phase(), GamePhase::DifficultySelect);
        assert!(game.session(PlayerSlot::One).is_none());
        assert!(game.motions().of_kind(MotionKind::BoundedStep).is_empty());
        assert_eq!(game.motions().of_kind(MotionKind::Loop).len(), 2);
        assert!(game.surface().bound_keys().is_empty());
        for car in old_cars {
            assert_eq!(game.scene().role(car), Some(Role::Npc));
        }

        game.select_difficulty(crate::trivia::Difficulty::Hard).unwrap();
        game.advance(3_000);
        assert_eq!(game.phase(), GamePhase::Playing);
        for slot in PlayerSlot::ALL {
            let session = game.session(slot).unwrap();
            assert_eq!(session.score(), 0);
            assert!(!session.is_locked());
            assert!(session.question().is_some());
            assert!(!old_cars.contains(&session.car));
        }
        assert_eq!(game.scene().count(Role::Car), 2);
    }

    #[test]
    fn test_stray_job_faults_and_is_dropped() {
        let mut game = Game::playing(3);
        let before = game.pending_tasks();
        game.scheduler
            .schedule_repeating(40, Job::Motion(ControllerId(9_999)));
        game.scheduler.schedule_once(40, Job::Countdown);

        let report = game.advance(200);
        assert_eq!(report.faults.len(), 2);
        assert_eq!(game.pending_tasks(), before);
        assert_eq!(game.phase(), GamePhase::Playing);
    }
}
