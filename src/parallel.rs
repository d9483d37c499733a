use std::ops::Range;

use anyhow::anyhow;

use crate::{EncodedSequence, ReadMode, Result};

/// Number of sequences a thread processes between calls to
/// [`ParallelProcessor::on_batch_complete`]
pub const BATCH_SIZE: usize = 1024;

/// A decoded sequence handed to a [`ParallelProcessor`]
#[derive(Debug, Clone, Copy)]
pub struct SequenceView<'a> {
    encseq: &'a EncodedSequence,
    seqnum: u64,
    start: u64,
    decoded: &'a [u8],
}

impl<'a> SequenceView<'a> {
    /// Sequence number in the (possibly mirrored) collection
    #[must_use]
    pub fn index(&self) -> u64 {
        self.seqnum
    }

    /// Logical position of the first symbol
    #[must_use]
    pub fn start(&self) -> u64 {
        self.start
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.decoded.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decoded.is_empty()
    }

    /// Printable characters of the sequence
    #[must_use]
    pub fn decoded(&self) -> &'a [u8] {
        self.decoded
    }

    /// Header line, if descriptions are loaded
    #[must_use]
    pub fn description(&self) -> Option<&'a [u8]> {
        self.encseq.description(self.seqnum).ok()
    }

    /// The collection the sequence belongs to
    #[must_use]
    pub fn encseq(&self) -> &'a EncodedSequence {
        self.encseq
    }
}

/// Trait for encoded sequences whose sequences can be processed in parallel
///
/// This is implemented by the **collection** not by the **processor**.
/// For the **processor**, see the [`ParallelProcessor`] trait.
pub trait ParallelReader {
    fn process_parallel<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
    ) -> Result<()>;

    /// Processes the sequences with numbers in `range`
    fn process_parallel_range<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
        range: Range<u64>,
    ) -> Result<()>;
}

/// Trait for types that can process sequences in parallel.
///
/// This is implemented by the **processor** not by the **collection**.
/// For the **collection**, see the [`ParallelReader`] trait.
pub trait ParallelProcessor: Send + Clone {
    /// Process a single sequence
    fn process_sequence(&mut self, view: SequenceView<'_>) -> Result<()>;

    /// Called when a thread finishes processing a batch
    /// Default implementation does nothing
    fn on_batch_complete(&mut self) -> Result<()> {
        Ok(())
    }

    /// Set the thread ID for this processor
    ///
    /// Each thread calls this method with its own unique ID.
    fn set_tid(&mut self, _tid: usize) {
        // Default implementation does nothing
    }

    /// Get the thread ID for this processor
    fn get_tid(&self) -> Option<usize> {
        None
    }
}

impl ParallelReader for EncodedSequence {
    fn process_parallel<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
    ) -> Result<()> {
        let num_sequences = self.num_sequences();
        self.process_parallel_range(processor, num_threads, 0..num_sequences)
    }

    fn process_parallel_range<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
        range: Range<u64>,
    ) -> Result<()> {
        // Calculate the number of threads to use
        let num_threads = if num_threads == 0 {
            num_cpus::get()
        } else {
            num_threads.min(num_cpus::get())
        };

        // Nothing to process or invalid range
        let num_sequences = self.num_sequences();
        if range.start >= range.end || range.end > num_sequences {
            return Ok(());
        }
        let per_thread = (range.end - range.start).div_ceil(num_threads as u64);

        let mut handles = Vec::with_capacity(num_threads);
        for tid in 0..num_threads {
            let mut processor = processor.clone();
            let encseq = self.clone();
            processor.set_tid(tid);

            let handle = std::thread::spawn(move || -> Result<()> {
                let first = range.start + tid as u64 * per_thread;
                let last = (first + per_thread).min(range.end);
                if first >= last {
                    return Ok(()); // No sequences for this thread
                }

                // reusable decoding buffer
                let mut buffer = Vec::new();
                let mut in_batch = 0;
                for seqnum in first..last {
                    let start = encseq.seqstartpos(seqnum)?;
                    let len = encseq.seqlength(seqnum)?;
                    buffer.clear();
                    encseq.extract_decoded(ReadMode::Forward, start, len, &mut buffer);
                    processor.process_sequence(SequenceView {
                        encseq: &encseq,
                        seqnum,
                        start,
                        decoded: &buffer,
                    })?;

                    in_batch += 1;
                    if in_batch == BATCH_SIZE {
                        processor.on_batch_complete()?;
                        in_batch = 0;
                    }
                }
                if in_batch > 0 {
                    processor.on_batch_complete()?;
                }
                Ok(())
            });
            handles.push(handle);
        }

        for (tid, handle) in handles.into_iter().enumerate() {
            handle
                .join()
                .map_err(|_| anyhow!("parallel worker {tid} panicked"))??;
        }
        Ok(())
    }
}
