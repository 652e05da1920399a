//! Base-32 geohash encoding for point records.

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Characters stored per point.
pub const GEOHASH_PRECISION: usize = 12;

/// Geohash of a lon/lat position with `precision` characters.
pub fn encode(lon: f64, lat: f64, precision: usize) -> String {
    let (mut lon_range, mut lat_range) = ((-180.0f64, 180.0f64), (-90.0f64, 90.0f64));
    let mut hash = String::with_capacity(precision);
    let mut even = true;
    let (mut bits, mut ch) = (0u8, 0usize);

    while hash.len() < precision {
        let (range, value) = if even {
            (&mut lon_range, lon)
        } else {
            (&mut lat_range, lat)
        };
        let mid = (range.0 + range.1) / 2.0;
        ch <<= 1;
        if value >= mid {
            ch |= 1;
            range.0 = mid;
        } else {
            range.1 = mid;
        }
        even = !even;

        bits += 1;
        if bits == 5 {
            hash.push(BASE32[ch] as char);
            bits = 0;
            ch = 0;
        }
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_hashes() {
        assert_eq!(encode(-5.6, 42.6, 5), "ezs42");
        assert_eq!(encode(10.40744, 57.64911, 11), "u4pruydqqvj");
    }

    #[test]
    fn test_default_precision() {
        assert_eq!(encode(-77.0, 38.9, GEOHASH_PRECISION).len(), 12);
    }
}
