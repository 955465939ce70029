use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::format::MediaType;
use crate::rational::TimeBase;

/// What the remuxer and the tasks need to know about a container stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub index: usize,
    pub media_type: MediaType,
    pub time_base: TimeBase,
}

impl StreamInfo {
    pub fn new(index: usize, media_type: MediaType, time_base: TimeBase) -> Self {
        Self {
            index,
            media_type,
            time_base,
        }
    }

    pub fn is_video(&self) -> bool {
        self.media_type == MediaType::Video
    }

    pub fn is_audio(&self) -> bool {
        self.media_type == MediaType::Audio
    }
}

/// Input stream index to output stream index; `None` drops the stream.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMapping {
    slots: Vec<Option<usize>>,
}

impl StreamMapping {
    /// A mapping for `input_count` streams, all dropped.
    pub fn new(input_count: usize) -> Self {
        Self {
            slots: vec![None; input_count],
        }
    }

    /// Keeps every stream under its own index.
    pub fn identity(input_count: usize) -> Self {
        Self {
            slots: (0..input_count).map(Some).collect(),
        }
    }

    /// Keeps audio, video and subtitle streams, numbering the kept ones
    /// consecutively from 0 in input order.
    pub fn from_media_types<I>(media_types: I) -> Self
    where
        I: IntoIterator<Item = MediaType>,
    {
        let mut next = 0;
        let slots = media_types
            .into_iter()
            .map(|media_type| {
                media_type.is_remuxable().then(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect();
        Self { slots }
    }

    pub fn from_streams(streams: &[StreamInfo]) -> Self {
        Self::from_media_types(streams.iter().map(|s| s.media_type))
    }

    /// Routes `input` to `output`, growing the mapping if needed.
    ///
    /// Fails with `InvalidArgument` if the mapping cannot grow to hold
    /// `input`.
    pub fn map(&mut self, input: usize, output: usize) -> Result<&mut Self> {
        if input >= self.slots.len() {
            let len = input
                .checked_add(1)
                .ok_or_else(|| Error::invalid_argument(format!("stream index {input} too large")))?;
            self.slots
                .try_reserve(len - self.slots.len())
                .map_err(|e| Error::invalid_argument(format!("stream index {input}: {e}")))?;
            self.slots.resize(len, None);
        }
        self.slots[input] = Some(output);
        Ok(self)
    }

    pub fn drop_stream(&mut self, input: usize) -> &mut Self {
        if let Some(slot) = self.slots.get_mut(input) {
            *slot = None;
        }
        self
    }

    /// Output index for `input`; streams beyond the mapping are dropped.
    pub fn get(&self, input: usize) -> Option<usize> {
        self.slots.get(input).copied().flatten()
    }

    pub fn input_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of distinct output streams.
    pub fn output_count(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .max()
            .map_or(0, |highest| highest + 1)
    }

    /// `(input, output)` pairs of the kept streams.
    pub fn kept(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(input, slot)| slot.map(|output| (input, output)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_numbers_kept_streams() {
        let mapping = StreamMapping::from_media_types([
            MediaType::Video,
            MediaType::Data,
            MediaType::Audio,
            MediaType::Attachment,
            MediaType::Subtitle,
        ]);
        assert_eq!(mapping.get(0), Some(0));
        assert_eq!(mapping.get(1), None);
        assert_eq!(mapping.get(2), Some(1));
        assert_eq!(mapping.get(3), None);
        assert_eq!(mapping.get(4), Some(2));
        assert_eq!(mapping.get(5), None);
        assert_eq!(mapping.output_count(), 3);
        assert_eq!(mapping.kept().collect::<Vec<_>>(), vec![(0, 0), (2, 1), (4, 2)]);
    }

    #[test]
    fn explicit_mapping() -> crate::Result<()> {
        let mut mapping = StreamMapping::new(2);
        assert_eq!(mapping.output_count(), 0);
        mapping.map(1, 0)?.map(3, 1)?;
        assert_eq!(mapping.input_count(), 4);
        assert_eq!(mapping.get(0), None);
        assert_eq!(mapping.get(3), Some(1));

        mapping.drop_stream(3);
        assert_eq!(mapping.get(3), None);
        assert_eq!(mapping.output_count(), 1);
        Ok(())
    }

    #[test]
    fn out_of_range_input_index_is_rejected() {
        let mut mapping = StreamMapping::new(1);
        let err = mapping.map(usize::MAX, 0).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument);
        assert_eq!(mapping.input_count(), 1);
    }

    #[test]
    fn identity_keeps_everything() {
        let mapping = StreamMapping::identity(3);
        assert_eq!(mapping.kept().count(), 3);
        assert_eq!(mapping.get(2), Some(2));
    }
}
