use burn::{lr_scheduler::LrScheduler, tensor::backend::Backend, LearningRate};

/// Configuration to create an [inverse square root](InverseSqrtLrScheduler) learning rate
/// scheduler.
#[derive(burn::config::Config)]
pub struct InverseSqrtLrSchedulerConfig {
    /// Peak learning rate, reached at the end of warmup
    init_lr: LearningRate,

    /// Number of linear warmup steps
    #[config(default = 2000)]
    warmup_steps: usize,
}

impl InverseSqrtLrSchedulerConfig {
    /// Initialize a new scheduler
    pub fn init(&self) -> InverseSqrtLrScheduler {
        InverseSqrtLrScheduler {
            init_lr: self.init_lr,
            warmup: (self.warmup_steps as f64).max(0.01),
            step: 0.0,
        }
    }
}

/// Linear warmup followed by decay proportional to the inverse square root of the step:
/// `init_lr * min(1 / sqrt(step), step / sqrt(warmup^3))`. The first step returns 0.
#[derive(Clone, Debug)]
pub struct InverseSqrtLrScheduler {
    init_lr: LearningRate,
    warmup: f64,
    step: f64,
}

impl InverseSqrtLrScheduler {
    /// The learning rate for the current step, then advance
    pub fn next_lr(&mut self) -> LearningRate {
        let scale = (1.0 / (self.step + 1e-20).sqrt()).min(self.step / self.warmup.powi(3).sqrt());
        self.step += 1.0;

        self.init_lr * scale
    }
}

impl<B: Backend> LrScheduler<B> for InverseSqrtLrScheduler {
    type Record = usize;

    fn step(&mut self) -> LearningRate {
        self.next_lr()
    }

    fn to_record(&self) -> Self::Record {
        self.step as usize
    }

    fn load_record(mut self, record: Self::Record) -> Self {
        self.step = record as f64;
        self
    }
}

/// The learning rate applied at each optimizer step: either constant or scheduled, scaled down
/// each time validation perplexity fails to improve.
#[derive(Clone, Debug)]
pub struct LearningRates {
    base: LearningRate,
    schedule: Option<InverseSqrtLrScheduler>,
    scale: f64,
}

impl LearningRates {
    /// A constant learning rate
    pub fn constant(base: LearningRate) -> Self {
        Self {
            base,
            schedule: None,
            scale: 1.0,
        }
    }

    /// A scheduled learning rate
    pub fn scheduled(schedule: InverseSqrtLrScheduler) -> Self {
        Self {
            base: schedule.init_lr,
            schedule: Some(schedule),
            scale: 1.0,
        }
    }

    /// The learning rate for the next step
    pub fn next_lr(&mut self) -> LearningRate {
        let lr = match self.schedule.as_mut() {
            Some(schedule) => schedule.next_lr(),
            None => self.base,
        };

        lr * self.scale
    }

    /// Multiply every future learning rate by `factor`
    pub fn decay(&mut self, factor: f64) {
        self.scale *= factor;
    }

    /// The current decay scale
    pub fn scale(&self) -> f64 {
        self.scale
    }
}

/// Lower the label smoothing as the model gets better. Returns `None` when the current
/// smoothing should be kept.
pub fn smoothing_for_perplexity(base: f64, perplexity: f64) -> Option<f64> {
    let reduction = if perplexity < 9.0 {
        0.06
    } else if perplexity < 12.0 {
        0.04
    } else if perplexity < 15.0 {
        0.02
    } else {
        return None;
    };

    Some((base - reduction).max(0.0))
}
