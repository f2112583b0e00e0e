// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Orientation helpers shared by the generators.

use glam::{Mat3, Mat4, Quat, Vec3};

use canopy_scene::{TrackAxis, UpAxis};

use crate::float;

fn track_index(axis: TrackAxis) -> u8 {
    match axis {
        TrackAxis::X => 0,
        TrackAxis::Y => 1,
        TrackAxis::Z => 2,
        TrackAxis::NegX => 3,
        TrackAxis::NegY => 4,
        TrackAxis::NegZ => 5,
    }
}

fn up_index(axis: UpAxis) -> u8 {
    match axis {
        UpAxis::X => 0,
        UpAxis::Y => 1,
        UpAxis::Z => 2,
    }
}

fn safe_acos(x: f32) -> f32 {
    float::acos(x.clamp(-1.0, 1.0))
}

/// Rotation that points the `track` axis against `vec`, then turns around
/// `vec` so that the `up` axis stays as upright as possible.
///
/// A zero `vec` gives the identity.
#[must_use]
pub(crate) fn vec_to_quat(vec: Vec3, track: TrackAxis, up: UpAxis) -> Quat {
    const EPS: f32 = 1e-4;

    let len = vec.length();
    if len == 0.0 {
        return Quat::IDENTITY;
    }
    let mut axis = track_index(track);
    let upflag = up_index(up);
    // Rotate the positive axis onto the negated vector; for negative axes,
    // onto the vector itself.
    let tvec = if axis > 2 {
        axis -= 3;
        vec
    } else {
        -vec
    };

    let (mut nor, co) = match axis {
        0 => {
            let mut nor = Vec3::new(0.0, -tvec.z, tvec.y);
            if float::abs(tvec.y) + float::abs(tvec.z) < EPS {
                nor.y = 1.0;
            }
            (nor, tvec.x)
        }
        1 => {
            let mut nor = Vec3::new(tvec.z, 0.0, -tvec.x);
            if float::abs(tvec.x) + float::abs(tvec.z) < EPS {
                nor.z = 1.0;
            }
            (nor, tvec.y)
        }
        _ => {
            let mut nor = Vec3::new(-tvec.y, tvec.x, 0.0);
            if float::abs(tvec.x) + float::abs(tvec.y) < EPS {
                nor.x = 1.0;
            }
            (nor, tvec.z)
        }
    };
    nor = nor.normalize_or_zero();
    let mut q = Quat::from_axis_angle(nor, safe_acos(co / len));

    if axis != upflag {
        let fp = Mat3::from_quat(q).z_axis;
        let angle = match (axis, upflag) {
            (0, 1) => 0.5 * float::atan2(fp.z, fp.y),
            (0, _) => -0.5 * float::atan2(fp.y, fp.z),
            (1, 0) => -0.5 * float::atan2(fp.z, fp.x),
            (1, _) => 0.5 * float::atan2(fp.x, fp.z),
            (_, 0) => 0.5 * float::atan2(-fp.y, -fp.x),
            _ => -0.5 * float::atan2(-fp.x, -fp.y),
        };
        let si = float::sin(angle) / len;
        let twist = Quat::from_xyzw(tvec.x * si, tvec.y * si, tvec.z * si, float::cos(angle));
        q = twist * q;
    }
    q
}

/// Rotation of a triangle: Z along `normal` and X along the edge `v1 -> v2`.
#[must_use]
pub(crate) fn tri_to_quat(v1: Vec3, v2: Vec3, normal: Vec3) -> Quat {
    // Tilt Z onto the normal.
    let mut n = Vec3::new(normal.y, -normal.x, 0.0).normalize_or_zero();
    if n.x == 0.0 && n.y == 0.0 {
        n.x = 1.0;
    }
    let angle = -0.5 * safe_acos(normal.z);
    let (si, co) = (float::sin(angle), float::cos(angle));
    let q1 = Quat::from_xyzw(n.x * si, n.y * si, 0.0, co);

    // Undo the tilt on the first edge and measure its angle with X.
    let mut edge = Mat3::from_quat(q1).inverse() * (v2 - v1);
    edge.z = 0.0;
    let edge = edge.normalize_or_zero();
    let angle = 0.5 * float::atan2(edge.y, edge.x);
    let (si, co) = (float::sin(angle), float::cos(angle));
    let q2 = Quat::from_xyzw(0.0, 0.0, si, co);

    q1 * q2
}

/// Unnormalized polygon normal by Newell's method; its length is twice the
/// polygon area.
#[must_use]
pub(crate) fn poly_cross(coords: &[Vec3]) -> Vec3 {
    let Some(&last) = coords.last() else {
        return Vec3::ZERO;
    };
    let mut prev = last;
    let mut n = Vec3::ZERO;
    for &cur in coords {
        n += prev.cross(cur);
        prev = cur;
    }
    n
}

/// Scales the rotation and scale columns of `m`, leaving its translation.
#[must_use]
pub(crate) fn scale_basis(m: Mat4, factor: f32) -> Mat4 {
    Mat4::from_cols(m.x_axis * factor, m.y_axis * factor, m.z_axis * factor, m.w_axis)
}

/// Replaces the translation of `m`.
#[must_use]
pub(crate) fn with_translation(m: Mat4, translation: Vec3) -> Mat4 {
    Mat4::from_cols(m.x_axis, m.y_axis, m.z_axis, translation.extend(1.0))
}

/// Lengths of the basis columns of `m`.
#[must_use]
pub(crate) fn basis_scale(m: &Mat4) -> Vec3 {
    Vec3::new(
        m.x_axis.truncate().length(),
        m.y_axis.truncate().length(),
        m.z_axis.truncate().length(),
    )
}

/// Multiplies only the 3x3 part of `m` by `rotation` from the left.
#[must_use]
pub(crate) fn pre_multiply_basis(rotation: Mat3, m: Mat4) -> Mat4 {
    let basis = rotation * Mat3::from_mat4(m);
    Mat4::from_cols(
        basis.x_axis.extend(0.0),
        basis.y_axis.extend(0.0),
        basis.z_axis.extend(0.0),
        m.w_axis,
    )
}
