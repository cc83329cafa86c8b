/// Splits a waveform into back-to-back frames of `frame_size` samples.
/// A trailing partial frame is dropped, never padded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSegmenter {
    frame_size: usize,
}

impl FrameSegmenter {
    pub fn new(frame_size: usize) -> Self {
        Self { frame_size }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn frame_count(&self, samples: usize) -> usize {
        samples.checked_div(self.frame_size).unwrap_or(0)
    }

    pub fn segment<'a>(&self, samples: &'a [f32]) -> impl ExactSizeIterator<Item = &'a [f32]> + 'a {
        let usable = self.frame_count(samples.len()) * self.frame_size;
        samples[..usable].chunks_exact(self.frame_size.max(1))
    }
}
