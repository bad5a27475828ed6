// Scalar-to-colour mapping for mesh fields

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgb(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }

    pub fn scale(self, factor: f32) -> Rgb {
        let f = factor.clamp(0.0, 1.0);
        let s = |c: u8| (c as f32 * f).round() as u8;
        Rgb(s(self.0), s(self.1), s(self.2))
    }
}

pub const FLAT_COLOR: Rgb = Rgb(0x94, 0xa3, 0xb8);

/// Three-stop ramp normalised to the field it is applied to.
#[derive(Debug, Clone, Copy)]
pub struct ColorRamp {
    pub low: Rgb,
    pub mid: Rgb,
    pub high: Rgb,
}

impl Default for ColorRamp {
    fn default() -> Self {
        Self {
            low: Rgb(0x25, 0x63, 0xeb),
            mid: Rgb(0x22, 0xc5, 0x5e),
            high: Rgb(0xef, 0x44, 0x44),
        }
    }
}

impl ColorRamp {
    /// `t` in `[0, 1]`; values outside are clamped.
    pub fn sample(&self, t: f32) -> Rgb {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        if t <= 0.5 {
            self.low.lerp(self.mid, t * 2.0)
        } else {
            self.mid.lerp(self.high, (t - 0.5) * 2.0)
        }
    }

    /// One colour per value. The range is the field's own finite min/max, so
    /// colours are relative to the current data. Non-finite entries get the
    /// flat colour; a constant field sits at the middle stop.
    pub fn colorize(&self, field: &[f32]) -> Vec<Rgb> {
        let range = field
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f32, f32)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            });

        field
            .iter()
            .map(|&v| match range {
                _ if !v.is_finite() => FLAT_COLOR,
                Some((lo, hi)) if hi > lo => self.sample((v - lo) / (hi - lo)),
                _ => self.mid,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extremes_map_to_ramp_ends() {
        let ramp = ColorRamp::default();
        let colors = ramp.colorize(&[3.0, -2.0, 0.5, 8.0, 1.0]);
        assert_eq!(colors[1], ramp.low);
        assert_eq!(colors[3], ramp.high);
        assert_ne!(colors[0], ramp.low);
        assert_ne!(colors[0], ramp.high);
    }

    #[test]
    fn test_midpoint_is_mid_stop() {
        let ramp = ColorRamp::default();
        assert_eq!(ramp.sample(0.5), ramp.mid);
        assert_eq!(ramp.sample(-3.0), ramp.low);
        assert_eq!(ramp.sample(7.0), ramp.high);
    }

    #[test]
    fn test_constant_and_non_finite_fields() {
        let ramp = ColorRamp::default();
        let colors = ramp.colorize(&[2.0, 2.0, f32::NAN]);
        assert_eq!(colors, vec![ramp.mid, ramp.mid, FLAT_COLOR]);
    }

    #[test]
    fn test_hex() {
        assert_eq!(ColorRamp::default().low.to_hex(), "#2563eb");
        assert_eq!(FLAT_COLOR.to_hex(), "#94a3b8");
    }
}
