/// Smoothstep easing, `0..1 -> 0..1`. Clamped at both ends.
pub fn smoothstep(t: f32) -> f32 {
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }
    t * t * (3.0 - 2.0 * t)
}
