use std::sync::atomic::{AtomicU32, AtomicUsize};
use std::sync::atomic::Ordering::SeqCst;
use time;

static OBJECT_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);
static THREAD_ID_COUNTER: AtomicU32 = AtomicU32::new(1);

thread_local! {
    static THREAD_ID: u32 = THREAD_ID_COUNTER.fetch_add(1, SeqCst);
}

// Generates a unique identifier for sessions, scenes and swapchains
#[allow(dead_code)]
pub fn new_id() -> u32 {
    OBJECT_ID_COUNTER.fetch_add(1, SeqCst) as u32
}

// Small, stable, non-zero identifier of the calling thread
pub fn current_thread_id() -> u32 {
    THREAD_ID.with(|id| *id)
}

// Returns the current monotonic time in seconds
pub fn time_in_seconds() -> f64 {
    time::precise_time_s()
}

// All matrices below are row-major, M[row * 4 + col].

pub fn multiply_matrix(a: &[f32; 16], b: &[f32; 16]) -> [f32; 16] {
    let mut out = [0.0; 16];
    for row in 0..4 {
        for col in 0..4 {
            out[row * 4 + col] = a[row * 4] * b[col] +
                                 a[row * 4 + 1] * b[4 + col] +
                                 a[row * 4 + 2] * b[8 + col] +
                                 a[row * 4 + 3] * b[12 + col];
        }
    }
    out
}

pub fn transpose_matrix(m: &[f32; 16]) -> [f32; 16] {
    let mut out = [0.0; 16];
    for row in 0..4 {
        for col in 0..4 {
            out[col * 4 + row] = m[row * 4 + col];
        }
    }
    out
}

/// Rotation applied around X first, then Y, then Z (Rz * Ry * Rx).
pub fn rotation_matrix(radians_x: f32, radians_y: f32, radians_z: f32) -> [f32; 16] {
    let (sin_x, cos_x) = radians_x.sin_cos();
    let (sin_y, cos_y) = radians_y.sin_cos();
    let (sin_z, cos_z) = radians_z.sin_cos();

    let rotation_x = [1.0, 0.0, 0.0, 0.0,
                      0.0, cos_x, -sin_x, 0.0,
                      0.0, sin_x, cos_x, 0.0,
                      0.0, 0.0, 0.0, 1.0];
    let rotation_y = [cos_y, 0.0, sin_y, 0.0,
                      0.0, 1.0, 0.0, 0.0,
                      -sin_y, 0.0, cos_y, 0.0,
                      0.0, 0.0, 0.0, 1.0];
    let rotation_z = [cos_z, -sin_z, 0.0, 0.0,
                      sin_z, cos_z, 0.0, 0.0,
                      0.0, 0.0, 1.0, 0.0,
                      0.0, 0.0, 0.0, 1.0];

    multiply_matrix(&rotation_z, &multiply_matrix(&rotation_y, &rotation_x))
}

/// Off-center perspective projection. A far plane at or before the near
/// plane gives an infinite projection.
pub fn projection_matrix(min_x: f32, max_x: f32, min_y: f32, max_y: f32, near: f32, far: f32) -> [f32; 16] {
    let width = max_x - min_x;
    let height = max_y - min_y;
    let offset_z = near;

    let (z_scale, z_offset) = if far <= near {
        (-1.0, -(near + offset_z))
    } else {
        (-(far + offset_z) / (far - near), -(far * (near + offset_z)) / (far - near))
    };

    [2.0 * near / width, 0.0, (max_x + min_x) / width, 0.0,
     0.0, 2.0 * near / height, (max_y + min_y) / height, 0.0,
     0.0, 0.0, z_scale, z_offset,
     0.0, 0.0, -1.0, 0.0]
}

pub fn projection_matrix_fov(fov_degrees_x: f32, fov_degrees_y: f32,
                             offset_x: f32, offset_y: f32,
                             near: f32, far: f32) -> [f32; 16] {
    let half_width = near * (fov_degrees_x * 0.5).to_radians().tan();
    let half_height = near * (fov_degrees_y * 0.5).to_radians().tan();

    projection_matrix(offset_x - half_width, offset_x + half_width,
                      offset_y - half_height, offset_y + half_height,
                      near, far)
}

/// Maps tangent angles to texture coordinates for a given projection.
/// The clip-Z to linear depth terms are stored in the otherwise unused last row.
pub fn tan_angle_matrix_from_projection(p: &[f32; 16]) -> [f32; 16] {
    [0.5 * p[0], 0.0, 0.5 * p[2] - 0.5, 0.0,
     0.0, -0.5 * p[5], -0.5 * p[6] - 0.5, 0.0,
     0.0, 0.0, -1.0, 0.0,
     p[10], p[11], p[14], 1.0]
}
