use candle_core::{Device, Result, Tensor};

/// Stacks tokenized titles into a (rows, title_len) u32 tensor. Titles are
/// truncated or right-padded with id 0; when more titles than rows are
/// given, the trailing window is kept, so histories ordered oldest-first
/// lose their oldest entries.
pub fn stack_titles(
    titles: &[Vec<u32>],
    rows: usize,
    title_len: usize,
    device: &Device,
) -> Result<Tensor> {
    let mut data = vec![0u32; rows * title_len];
    let start = titles.len().saturating_sub(rows);
    for (row, title) in titles[start..].iter().enumerate() {
        for (col, &id) in title.iter().take(title_len).enumerate() {
            data[row * title_len + col] = id;
        }
    }
    Tensor::from_vec(data, (rows, title_len), device)
}

/// Stacks per-article ages into a (rows,) f32 tensor, windowed and padded
/// the same way as `stack_titles` so the rows stay aligned.
pub fn stack_ages(ages: &[f32], rows: usize, device: &Device) -> Result<Tensor> {
    let mut data = vec![0f32; rows];
    let start = ages.len().saturating_sub(rows);
    for (i, &age) in ages[start..].iter().enumerate() {
        data[i] = age;
    }
    Tensor::from_vec(data, rows, device)
}
