//! Spatial extraction for OCR word layouts.
//!
//! Words are grouped into lines by vertical position so the text pipeline can
//! run on them, and labels are paired with nearby values by bounding box.

mod search;

pub use search::{SpatialLabel, SpatialSearch, spatial_score};

use crate::models::document::Word;

/// One reconstructed line of words.
#[derive(Debug, Clone, PartialEq)]
pub struct WordLine {
    /// Indices into the input word list, left to right.
    pub words: Vec<usize>,
    pub text: String,
}

/// Line structure rebuilt from word boxes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    /// Lines joined with `\n`.
    pub text: String,
    pub lines: Vec<WordLine>,
}

impl Layout {
    /// Line holding the word at `index`.
    pub fn line_of(&self, index: usize) -> Option<usize> {
        self.lines.iter().position(|line| line.words.contains(&index))
    }

    /// Word immediately before or after `index` on its line.
    pub fn neighbor(&self, index: usize, offset: isize) -> Option<usize> {
        let line = &self.lines[self.line_of(index)?];
        let pos = line.words.iter().position(|&w| w == index)?;
        let target = pos.checked_add_signed(offset)?;
        line.words.get(target).copied()
    }
}

/// Group words into lines: top to bottom, then left to right.
///
/// A word joins the current line when its vertical center is within
/// `tolerance` of the line's mean center. Words with negative confidence or
/// empty text are ignored.
pub fn reconstruct_lines(words: &[Word], tolerance: f32) -> Layout {
    let mut order: Vec<usize> = (0..words.len())
        .filter(|&i| words[i].confidence >= 0.0 && !words[i].text.trim().is_empty())
        .collect();
    order.sort_by(|&a, &b| words[a].center().1.total_cmp(&words[b].center().1));

    let mut groups: Vec<(f32, Vec<usize>)> = Vec::new();
    for index in order {
        let cy = words[index].center().1;
        match groups.last_mut() {
            Some((mean, members)) if (cy - *mean).abs() <= tolerance => {
                members.push(index);
                *mean += (cy - *mean) / members.len() as f32;
            }
            _ => groups.push((cy, vec![index])),
        }
    }

    let lines: Vec<WordLine> = groups
        .into_iter()
        .map(|(_, mut members)| {
            members.sort_by(|&a, &b| words[a].x.total_cmp(&words[b].x));
            let text = members
                .iter()
                .map(|&i| words[i].text.trim())
                .collect::<Vec<_>>()
                .join(" ");
            WordLine { words: members, text }
        })
        .collect();

    let text = lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>().join("\n");
    Layout { text, lines }
}
