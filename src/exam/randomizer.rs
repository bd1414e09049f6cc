// src/exam/randomizer.rs

use rand::Rng;

/// Draws the question list presented to one student.
///
/// Performs a Fisher-Yates shuffle on a copy of `questions`, then keeps the
/// first `count` elements. `None` keeps the whole list; a count larger than the
/// list never pads or duplicates. The input slice is left untouched.
///
/// Called once per session start, never mid-session.
pub fn randomize<T, R>(questions: &[T], count: Option<usize>, rng: &mut R) -> Vec<T>
where
    T: Clone,
    R: Rng + ?Sized,
{
    let mut shuffled = questions.to_vec();

    for i in (1..shuffled.len()).rev() {
        let j = rng.gen_range(0..=i);
        shuffled.swap(i, j);
    }

    if let Some(count) = count {
        shuffled.truncate(count);
    }

    shuffled
}

/// Converts a client-supplied count into a draw size. Negative counts draw nothing.
pub fn draw_size(requested: Option<i64>) -> Option<usize> {
    requested.map(|k| usize::try_from(k).unwrap_or(0))
}
