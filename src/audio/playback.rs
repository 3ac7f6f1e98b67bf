//! Playback queue over a hardware sink.
//!
//! The queue holds no samples of its own: `write` hands the sink as many
//! samples as it has room for right now and reports how many that was.
//! Retrying the rest (or dropping it) is the caller's policy.
//!
//! Several users may share the output. The sink is started by the first
//! `begin` and stopped by the last `end`.

/// Playback errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    /// The sink refused to start.
    #[error("playback sink failed to start at {0} Hz")]
    StartFailed(u32),
    /// A second user asked for a different rate than the running one.
    #[error("playback running at {active} Hz, {requested} Hz requested")]
    RateMismatch { active: u32, requested: u32 },
    /// The output driver reported an error code.
    #[error("playback driver error {0}")]
    Driver(i32),
}

/// Hardware audio output (I2S on the target, memory on the host).
pub trait PlaybackSink {
    /// Samples the sink can take right now without blocking.
    fn available(&self) -> usize;

    /// Queue up to `samples.len()` samples. Returns the number taken.
    fn write(&mut self, samples: &[i16]) -> usize;

    /// Start output at `sample_rate`.
    fn start(&mut self, sample_rate: u32) -> Result<(), PlaybackError>;

    /// Stop output.
    fn stop(&mut self);
}

impl<T: PlaybackSink + ?Sized> PlaybackSink for &mut T {
    fn available(&self) -> usize {
        (**self).available()
    }

    fn write(&mut self, samples: &[i16]) -> usize {
        (**self).write(samples)
    }

    fn start(&mut self, sample_rate: u32) -> Result<(), PlaybackError> {
        (**self).start(sample_rate)
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}

/// Reference-counted playback front end.
pub struct PlaybackQueue<S> {
    sink: S,
    users: u32,
    sample_rate: u32,
}

impl<S: PlaybackSink> PlaybackQueue<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            users: 0,
            sample_rate: 0,
        }
    }

    /// Register a user, starting the sink if this is the first.
    pub fn begin(&mut self, sample_rate: u32) -> Result<(), PlaybackError> {
        if self.users == 0 {
            self.sink.start(sample_rate)?;
            self.sample_rate = sample_rate;
        } else if sample_rate != self.sample_rate {
            return Err(PlaybackError::RateMismatch {
                active: self.sample_rate,
                requested: sample_rate,
            });
        }
        self.users += 1;
        Ok(())
    }

    /// Unregister a user, stopping the sink after the last one.
    ///
    /// Without a matching `begin` this does nothing.
    pub fn end(&mut self) {
        match self.users {
            0 => {}
            1 => {
                self.users = 0;
                self.sink.stop();
            }
            _ => self.users -= 1,
        }
    }

    /// Write `min(samples.len(), available())` samples. Never buffers.
    ///
    /// Returns 0 while no user is registered.
    #[inline]
    pub fn write(&mut self, samples: &[i16]) -> usize {
        if self.users == 0 {
            return 0;
        }
        let n = samples.len().min(self.sink.available());
        if n == 0 {
            return 0;
        }
        self.sink.write(&samples[..n])
    }

    #[inline]
    pub fn available(&self) -> usize {
        if self.users == 0 {
            0
        } else {
            self.sink.available()
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.users > 0
    }

    #[inline]
    pub fn users(&self) -> u32 {
        self.users
    }

    /// Rate of the running sink (0 when stopped).
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        if self.users == 0 {
            0
        } else {
            self.sample_rate
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
