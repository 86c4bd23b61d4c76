/// Generates a simple high-contrast checkerboard image.
pub fn checkerboard_u8(width: usize, height: usize, cell: usize) -> Vec<u8> {
    assert!(width > 0 && height > 0, "image dimensions must be positive");
    assert!(cell > 0, "cell size must be positive");

    let mut img = vec![0u8; width * height];
    for y in 0..height {
        for x in 0..width {
            let sum = x / cell + y / cell;
            img[y * width + x] = if sum & 1 == 0 { 32 } else { 220 };
        }
    }
    img
}

/// Checkerboard whose cell borders sit at the mid-grey level, so every
/// interior grid crossing is a symmetric saddle.
pub fn aa_checkerboard(width: usize, height: usize, cell: usize) -> Vec<u8> {
    let s = |v: usize| -> i32 {
        if v % cell == 0 {
            0
        } else if (v / cell) % 2 == 0 {
            1
        } else {
            -1
        }
    };
    let mut img = vec![0u8; width * height];
    for y in 0..height {
        for x in 0..width {
            img[y * width + x] = (126 + 94 * s(x) * s(y)) as u8;
        }
    }
    img
}

/// Dark image with a single bright quadrant starting at `(edge, edge)`; the
/// edge row and column are half intensity.
pub fn l_corner(size: usize, edge: usize) -> Vec<u8> {
    let p = |v: usize| -> f64 {
        match v.cmp(&edge) {
            std::cmp::Ordering::Less => 0.0,
            std::cmp::Ordering::Equal => 0.5,
            std::cmp::Ordering::Greater => 1.0,
        }
    };
    let mut img = vec![0u8; size * size];
    for y in 0..size {
        for x in 0..size {
            img[y * size + x] = (32.0 + 188.0 * p(x) * p(y)) as u8;
        }
    }
    img
}

/// Horizontal ramp `step * x` replicated over `channels`.
pub fn ramp(width: usize, height: usize, channels: usize, step: u8) -> Vec<u8> {
    let mut img = Vec::with_capacity(width * height * channels);
    for _ in 0..height {
        for x in 0..width {
            let v = (x as u32 * step as u32).min(255) as u8;
            img.extend(std::iter::repeat(v).take(channels));
        }
    }
    img
}

/// Deterministic xorshift noise, one value per sample.
pub fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.max(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

/// Returns `(x, y)` of every non-zero sample of a single-channel image.
pub fn nonzero_positions(data: &[u8], width: usize) -> Vec<(usize, usize)> {
    data.iter()
        .enumerate()
        .filter(|(_, &v)| v != 0)
        .map(|(i, _)| (i % width, i / width))
        .collect()
}
