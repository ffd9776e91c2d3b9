use rtrb::{Consumer, Producer, RingBuffer};

/// Lock-free SPSC sample ring between the cpal callback and the frame pump.
///
/// This is transport only: it smooths scheduling jitter between the real-time
/// callback and the async pump. The pre-roll window lives in
/// [`crate::preroll::PrerollBuffer`], downstream of this ring.
pub struct SampleRing {
    producer: Producer<i16>,
    consumer: Consumer<i16>,
}

impl SampleRing {
    pub fn new(capacity_samples: usize) -> Self {
        let (producer, consumer) = RingBuffer::new(capacity_samples);
        Self { producer, consumer }
    }

    pub fn split(self) -> (SampleWriter, SampleReader) {
        (
            SampleWriter {
                producer: self.producer,
            },
            SampleReader {
                consumer: self.consumer,
            },
        )
    }
}

/// Producer half, owned by the audio callback thread.
pub struct SampleWriter {
    producer: Producer<i16>,
}

impl SampleWriter {
    /// Write as many samples as fit and return the count. The callback must
    /// never block, so under pressure the tail of the batch is dropped and the
    /// caller accounts for the shortfall.
    pub fn write(&mut self, samples: &[i16]) -> usize {
        let writable = samples.len().min(self.producer.slots());
        if writable == 0 {
            return 0;
        }
        let mut chunk = match self.producer.write_chunk(writable) {
            Ok(chunk) => chunk,
            Err(_) => return 0,
        };

        // The chunk may wrap; fill both slices.
        let (first, second) = chunk.as_mut_slices();
        let split = first.len();
        first.copy_from_slice(&samples[..split]);
        if !second.is_empty() {
            second.copy_from_slice(&samples[split..split + second.len()]);
        }
        chunk.commit_all();
        writable
    }

    pub fn free_slots(&self) -> usize {
        self.producer.slots()
    }
}

/// Consumer half, owned by the pump.
pub struct SampleReader {
    consumer: Consumer<i16>,
}

impl SampleReader {
    /// Read up to `buffer.len()` samples, returning how many were read.
    pub fn read(&mut self, buffer: &mut [i16]) -> usize {
        let readable = buffer.len().min(self.consumer.slots());
        if readable == 0 {
            return 0;
        }
        let chunk = match self.consumer.read_chunk(readable) {
            Ok(chunk) => chunk,
            Err(_) => return 0,
        };

        let (first, second) = chunk.as_slices();
        let split = first.len();
        buffer[..split].copy_from_slice(first);
        if !second.is_empty() {
            buffer[split..split + second.len()].copy_from_slice(second);
        }
        chunk.commit_all();
        readable
    }

    pub fn available(&self) -> usize {
        self.consumer.slots()
    }
}
