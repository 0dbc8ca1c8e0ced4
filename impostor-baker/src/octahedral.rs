/// Octahedral direction encoding for view-sphere sampling
use glam::{Vec2, Vec3};

/// Sign that treats zero as positive, so fold edges stay on one side.
fn sign_not_zero(v: f32) -> f32 {
    if v >= 0.0 { 1.0 } else { -1.0 }
}

/// Encodes a direction into octahedral coordinates in [-1,1]².
/// The lower hemisphere is folded into the square's corners.
pub fn encode(direction: Vec3) -> Vec2 {
    let l1 = direction.x.abs() + direction.y.abs() + direction.z.abs();
    if l1 <= f32::EPSILON {
        return Vec2::ZERO;
    }

    let p = direction / l1;
    if p.z >= 0.0 {
        Vec2::new(p.x, p.y)
    } else {
        Vec2::new(
            (1.0 - p.y.abs()) * sign_not_zero(p.x),
            (1.0 - p.x.abs()) * sign_not_zero(p.y),
        )
    }
}

/// Decodes octahedral coordinates in [-1,1]² into a unit direction.
pub fn decode(e: Vec2) -> Vec3 {
    let mut n = Vec3::new(e.x, e.y, 1.0 - e.x.abs() - e.y.abs());

    // Fold the lower hemisphere back out of the corners.
    if n.z < 0.0 {
        n = Vec3::new(
            (1.0 - n.y.abs()) * sign_not_zero(n.x),
            (1.0 - n.x.abs()) * sign_not_zero(n.y),
            n.z,
        );
    }

    n.try_normalize().unwrap_or(Vec3::Z)
}

/// Encodes a direction into [0,1]² texture space.
pub fn encode_unit(direction: Vec3) -> Vec2 {
    encode(direction) * 0.5 + Vec2::splat(0.5)
}

/// Decodes a [0,1]² texture-space coordinate into a unit direction.
pub fn decode_unit(uv: Vec2) -> Vec3 {
    decode(uv * 2.0 - Vec2::ONE)
}

/// Direction sampled at the centre of tile (tx, ty) in an N x N grid.
pub fn tile_direction(tx: u32, ty: u32, tile_count: u32) -> Vec3 {
    let n = tile_count as f32;
    decode_unit(Vec2::new((tx as f32 + 0.5) / n, (ty as f32 + 0.5) / n))
}

/// Tile whose cell contains the encoded direction.
/// This is the runtime lookup matching `tile_direction` at bake time.
pub fn nearest_tile(direction: Vec3, tile_count: u32) -> (u32, u32) {
    let uv = encode_unit(direction);
    let last = tile_count.saturating_sub(1);
    let n = tile_count as f32;
    let tx = ((uv.x * n).floor().max(0.0) as u32).min(last);
    let ty = ((uv.y * n).floor().max(0.0) as u32).min(last);
    (tx, ty)
}
