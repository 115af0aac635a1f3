//! Dense bit-matrix transpose.
//!
//! The x86_64 path processes 16x8 tiles with `_mm_movemask_epi8`, extracting
//! the top bit of each of 16 bytes and shifting left eight times to emit the
//! output bytes of eight columns per tile. Trailing 8x16 and 8x8 tiles handle
//! matrices whose row count is not a multiple of 16.
use crate::util::Block;
use bytemuck::{cast_slice, cast_slice_mut};

/// Transpose a row-major `rows x cols` bit matrix into a `cols x rows` one.
///
/// Both dimensions must be multiples of 8 and `input` must hold exactly
/// `rows * cols / 8` bytes. Bits are indexed LSB first within each byte.
pub fn transpose(input: &[u8], rows: usize, cols: usize) -> Vec<u8> {
    assert_eq!(
        input.len(),
        rows * cols / 8,
        "input matrix must have length rows * cols / 8"
    );
    assert_eq!(rows % 8, 0, "rows must be divisible by 8");
    assert_eq!(cols % 8, 0, "cols must be divisible by 8");
    #[cfg(target_arch = "x86_64")]
    {
        transpose_sse(input, rows, cols)
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        transpose_portable(input, rows, cols)
    }
}

/// Transpose a bit matrix stored as blocks, `rows` rows of `cols` bits each.
pub fn transpose_blocks(input: &[Block], rows: usize, cols: usize) -> Vec<Block> {
    assert_eq!(
        input.len() * 128,
        rows * cols,
        "block matrix must have length rows * cols / 128"
    );
    let transposed = transpose(cast_slice(input), rows, cols);
    let mut out = vec![Block::zero(); input.len()];
    cast_slice_mut::<Block, u8>(&mut out).copy_from_slice(&transposed);
    out
}

#[cfg(target_arch = "x86_64")]
fn transpose_sse(input: &[u8], nrows: usize, ncols: usize) -> Vec<u8> {
    use std::arch::x86_64::{_mm_movemask_epi8, _mm_setr_epi8, _mm_slli_epi64};

    let mut output = vec![0_u8; nrows * ncols / 8];

    let inp = |x: usize, y: usize| -> usize { x * ncols / 8 + y / 8 };
    let out = |x: usize, y: usize| -> usize { y * nrows / 8 + x / 8 };

    unsafe {
        let mut rr = 0;
        // main body in 16x8 tiles
        while rr + 16 <= nrows {
            let mut cc = 0;
            while cc < ncols {
                let mut v = _mm_setr_epi8(
                    *input.get_unchecked(inp(rr, cc)) as i8,
                    *input.get_unchecked(inp(rr + 1, cc)) as i8,
                    *input.get_unchecked(inp(rr + 2, cc)) as i8,
                    *input.get_unchecked(inp(rr + 3, cc)) as i8,
                    *input.get_unchecked(inp(rr + 4, cc)) as i8,
                    *input.get_unchecked(inp(rr + 5, cc)) as i8,
                    *input.get_unchecked(inp(rr + 6, cc)) as i8,
                    *input.get_unchecked(inp(rr + 7, cc)) as i8,
                    *input.get_unchecked(inp(rr + 8, cc)) as i8,
                    *input.get_unchecked(inp(rr + 9, cc)) as i8,
                    *input.get_unchecked(inp(rr + 10, cc)) as i8,
                    *input.get_unchecked(inp(rr + 11, cc)) as i8,
                    *input.get_unchecked(inp(rr + 12, cc)) as i8,
                    *input.get_unchecked(inp(rr + 13, cc)) as i8,
                    *input.get_unchecked(inp(rr + 14, cc)) as i8,
                    *input.get_unchecked(inp(rr + 15, cc)) as i8,
                );
                for i in (0..8).rev() {
                    let h = (_mm_movemask_epi8(v) as u16).to_le_bytes();
                    *output.get_unchecked_mut(out(rr, cc + i)) = h[0];
                    *output.get_unchecked_mut(out(rr, cc + i) + 1) = h[1];
                    v = _mm_slli_epi64::<1>(v);
                }
                cc += 8;
            }
            rr += 16;
        }
        if rr == nrows {
            return output;
        }

        // the remainder is a strip of 8 rows, done in 8x16 tiles
        let mut cc = 0;
        while cc + 16 <= ncols {
            let mut v = _mm_setr_epi8(
                *input.get_unchecked(inp(rr, cc)) as i8,
                *input.get_unchecked(inp(rr + 1, cc)) as i8,
                *input.get_unchecked(inp(rr + 2, cc)) as i8,
                *input.get_unchecked(inp(rr + 3, cc)) as i8,
                *input.get_unchecked(inp(rr + 4, cc)) as i8,
                *input.get_unchecked(inp(rr + 5, cc)) as i8,
                *input.get_unchecked(inp(rr + 6, cc)) as i8,
                *input.get_unchecked(inp(rr + 7, cc)) as i8,
                *input.get_unchecked(inp(rr, cc + 8)) as i8,
                *input.get_unchecked(inp(rr + 1, cc + 8)) as i8,
                *input.get_unchecked(inp(rr + 2, cc + 8)) as i8,
                *input.get_unchecked(inp(rr + 3, cc + 8)) as i8,
                *input.get_unchecked(inp(rr + 4, cc + 8)) as i8,
                *input.get_unchecked(inp(rr + 5, cc + 8)) as i8,
                *input.get_unchecked(inp(rr + 6, cc + 8)) as i8,
                *input.get_unchecked(inp(rr + 7, cc + 8)) as i8,
                );
            for i in (0..8).rev() {
                let h = (_mm_movemask_epi8(v) as u16).to_le_bytes();
                *output.get_unchecked_mut(out(rr, cc + i)) = h[0];
                *output.get_unchecked_mut(out(rr, cc + i + 8)) = h[1];
                v = _mm_slli_epi64::<1>(v);
            }
            cc += 16;
        }
        if cc == ncols {
            return output;
        }

        // the final 8x8 tile
        let mut v = _mm_setr_epi8(
            *input.get_unchecked(inp(rr, cc)) as i8,
            *input.get_unchecked(inp(rr + 1, cc)) as i8,
            *input.get_unchecked(inp(rr + 2, cc)) as i8,
            *input.get_unchecked(inp(rr + 3, cc)) as i8,
            *input.get_unchecked(inp(rr + 4, cc)) as i8,
            *input.get_unchecked(inp(rr + 5, cc)) as i8,
            *input.get_unchecked(inp(rr + 6, cc)) as i8,
            *input.get_unchecked(inp(rr + 7, cc)) as i8,
            0,
            0,
            0,
            0,
            0,
            0,
            0,
            0,
        );
        for i in (0..8).rev() {
            let h = (_mm_movemask_epi8(v) as u16).to_le_bytes();
            *output.get_unchecked_mut(out(rr, cc + i)) = h[0];
            v = _mm_slli_epi64::<1>(v);
        }
    }
    output
}

/// Portable transpose over 8x8 tiles. Used on non-x86_64 targets.
pub fn transpose_portable(input: &[u8], nrows: usize, ncols: usize) -> Vec<u8> {
    let mut output = vec![0_u8; nrows * ncols / 8];
    let in_stride = ncols / 8;
    let out_stride = nrows / 8;
    for rr in (0..nrows).step_by(8) {
        for cc in (0..ncols).step_by(8) {
            let mut tile = [0_u8; 8];
            for (k, byte) in tile.iter_mut().enumerate() {
                *byte = input[(rr + k) * in_stride + cc / 8];
            }
            let transposed = transpose_8x8(u64::from_le_bytes(tile)).to_le_bytes();
            for (k, byte) in transposed.iter().enumerate() {
                output[(cc + k) * out_stride + rr / 8] = *byte;
            }
        }
    }
    output
}

// Moves bit j of byte i to bit i of byte j by shifting the off-diagonals.
fn transpose_8x8(w: u64) -> u64 {
    (w & 0x8040201008040201)
        | ((w & 0x4020100804020100) >> 7)
        | ((w & 0x2010080402010000) >> 14)
        | ((w & 0x1008040201000000) >> 21)
        | ((w & 0x0804020100000000) >> 28)
        | ((w & 0x0402010000000000) >> 35)
        | ((w & 0x0201000000000000) >> 42)
        | ((w & 0x0100000000000000) >> 49)
        | ((w & 0x0080402010080402) << 7)
        | ((w & 0x0000804020100804) << 14)
        | ((w & 0x0000008040201008) << 21)
        | ((w & 0x0000000080402010) << 28)
        | ((w & 0x0000000000804020) << 35)
        | ((w & 0x0000000000008040) << 42)
        | ((w & 0x0000000000000080) << 49)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn get_bit(mat: &[u8], cols: usize, r: usize, c: usize) -> bool {
        (mat[r * cols / 8 + c / 8] >> (c % 8)) & 1 == 1
    }

    fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> Vec<u8> {
        (0..rows * cols / 8).map(|_| rng.gen()).collect()
    }

    #[test]
    #[rustfmt::skip]
    fn transpose_16x16_pattern() {
        let data = vec![
            0b00000001, 0b00000000,
            0b00000001, 0b00000000,
            0b00000001, 0b00000000,
            0b00000001, 0b00000000,
            0b00000001, 0b00000000,
            0b00000001, 0b00000000,
            0b00000001, 0b00000000,
            0b00000001, 0b00000000,
            0b00000001, 0b00000000,
            0b00000001, 0b00000000,
            0b00000001, 0b00000000,
            0b00000001, 0b00000000,
            0b00000001, 0b00000000,
            0b00000001, 0b00000000,
            0b00000001, 0b00000000,
            0b00000001, 0b00000000,
        ];
        let mut expected = vec![0_u8; 32];
        expected[0] = 0b11111111;
        expected[1] = 0b11111111;
        assert_eq!(transpose(&data, 16, 16), expected);
    }

    #[test]
    fn involution() {
        let mut rng = StdRng::seed_from_u64(42);
        for (rows, cols) in [(128, 128), (256, 128), (1024, 256), (2048, 128)] {
            let mat = random_matrix(&mut rng, rows, cols);
            let double = transpose(&transpose(&mat, rows, cols), cols, rows);
            assert_eq!(double, mat, "involution failed for {rows}x{cols}");
        }
    }

    #[test]
    fn identity_diagonal_256x128() {
        let rows = 256;
        let cols = 128;
        let mut mat = vec![0_u8; rows * cols / 8];
        for i in 0..cols {
            mat[i * cols / 8 + i / 8] |= 1 << (i % 8);
        }
        let transposed = transpose(&mat, rows, cols);
        for j in 0..cols {
            for i in 0..rows {
                let expected = i == j;
                assert_eq!(get_bit(&transposed, rows, j, i), expected, "bit ({j},{i})");
            }
        }
    }

    #[test]
    fn trailing_tiles() {
        // rows % 16 == 8 exercises the 8x16 and 8x8 fall-through branches
        let mut rng = StdRng::seed_from_u64(43);
        for (rows, cols) in [(24, 16), (8, 24), (40, 8)] {
            let mat = random_matrix(&mut rng, rows, cols);
            let transposed = transpose(&mat, rows, cols);
            for r in 0..rows {
                for c in 0..cols {
                    assert_eq!(
                        get_bit(&mat, cols, r, c),
                        get_bit(&transposed, rows, c, r),
                        "bit ({r},{c}) in {rows}x{cols}"
                    );
                }
            }
        }
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn portable_matches_sse() {
        let mut rng = StdRng::seed_from_u64(44);
        for (rows, cols) in [(128, 128), (24, 16), (512, 128)] {
            let mat = random_matrix(&mut rng, rows, cols);
            assert_eq!(
                transpose(&mat, rows, cols),
                transpose_portable(&mat, rows, cols),
            );
        }
    }

    #[test]
    fn block_matrix_round_trip() {
        let mut rng = StdRng::seed_from_u64(45);
        let blocks: Vec<Block> = (0..256).map(|_| rng.gen()).collect();
        // 256 blocks = 128 rows of 256 bits
        let transposed = transpose_blocks(&blocks, 128, 256);
        let double = transpose_blocks(&transposed, 256, 128);
        assert_eq!(double, blocks);
    }
}
