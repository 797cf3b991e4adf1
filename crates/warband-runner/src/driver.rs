//! Paced tick loop around a [`World`].

use anyhow::{Context, Result};
use std::future::Future;
use tokio::time::{interval, Duration, Interval, MissedTickBehavior};
use tracing::{debug, info};
use warband_core::{RunnerConfig, WorldStats};
use warband_world::World;

pub struct Driver {
    world: World,
    config: RunnerConfig,
    delay: Duration,
}

impl Driver {
    pub fn new(config: RunnerConfig) -> Result<Self> {
        let delay = Duration::try_from_secs_f64(config.world.tick_delay_secs).with_context(|| {
            format!("tick delay of {} seconds is out of range", config.world.tick_delay_secs)
        })?;
        let world = World::new(config.world.clone())?;
        Ok(Self {
            world,
            config,
            delay,
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Step until the tick limit is reached or `shutdown` resolves
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> Result<WorldStats> {
        let delay = self.delay;
        let mut pacer = (!delay.is_zero()).then(|| {
            let mut pacer = interval(delay);
            pacer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            pacer
        });
        tokio::pin!(shutdown);

        loop {
            if self.config.max_ticks.is_some_and(|max| self.world.tick() >= max) {
                info!(tick = self.world.tick(), "Tick limit reached");
                break;
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(tick = self.world.tick(), "Stopping simulation");
                    break;
                }
                _ = pace(&mut pacer) => {}
            }

            self.world.step();
            self.report();
        }

        Ok(*self.world.stats())
    }

    fn report(&self) {
        let tick = self.world.tick();
        if self.config.log_every > 0 && tick % self.config.log_every == 0 {
            let stats = self.world.stats();
            info!(
                tick = tick,
                alpha = stats.alpha.population,
                beta = stats.beta.population,
                alpha_shelters = stats.alpha.shelters,
                beta_shelters = stats.beta.shelters,
                alpha_ore = stats.alpha.ore,
                beta_ore = stats.beta.ore,
                war_bands = self.world.war_bands().len(),
                "Population"
            );
        }

        if self.config.render {
            debug!("tick {}\n{}", tick, self.world.snapshot().render_ascii());
        }
    }
}

async fn pace(pacer: &mut Option<Interval>) {
    match pacer {
        Some(pacer) => {
            pacer.tick().await;
        }
        None => tokio::task::yield_now().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warband_core::WorldConfig;

    fn fast_config(max_ticks: Option<u64>) -> RunnerConfig {
        RunnerConfig {
            world: WorldConfig {
                grid_size: 8,
                tick_delay_secs: 0.0,
                seed: 11,
                ..Default::default()
            },
            max_ticks,
            log_every: 2,
            render: true,
        }
    }

    #[tokio::test]
    async fn test_stops_at_tick_limit() {
        let mut driver = Driver::new(fast_config(Some(3))).unwrap();
        let stats = driver.run(std::future::pending()).await.unwrap();

        assert_eq!(driver.world().tick(), 3);
        assert_eq!(&stats, driver.world().stats());
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let mut driver = Driver::new(fast_config(None)).unwrap();
        driver.run(async {}).await.unwrap();

        assert_eq!(driver.world().tick(), 0);
    }

    #[test]
    fn test_oversized_tick_delay_rejected() {
        let mut config = fast_config(Some(1));
        config.world.tick_delay_secs = 1e20;
        assert!(config.world.validate().is_ok());

        let err = Driver::new(config).err().unwrap();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_invalid_world_rejected() {
        let mut config = fast_config(None);
        config.world.grid_size = 0;
        assert!(Driver::new(config).is_err());
    }
}
