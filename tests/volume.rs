//! Inverted elements are reported, not silently integrated.

mod common;

use approx::assert_relative_eq;
use common::{sample, Block};
use lagfe::{
    ElementSet, ExecutionPolicy, Hypoelastic, Interleaved, KernelConfig, KernelError, KernelForm,
    Layout, MaterialState, OnTheFly, StepReport,
};
use nalgebra::Vector3;

fn run(block: &Block, uhat: &[f64], config: KernelConfig) -> StepReport {
    let coords = Interleaved::new(&block.coords).unwrap();
    let model = Hypoelastic::from_moduli(1.0, 2.0).unwrap();
    let zeros = vec![0.0; block.coords.len()];
    let mut state = MaterialState::new(block.num_points(), &model);
    let (report, _) = common::step(
        block,
        &OnTheFly::new(&coords),
        &model,
        config,
        1.0,
        &Interleaved::new(&zeros).unwrap(),
        &Interleaved::new(uhat).unwrap(),
        &mut state,
        Layout::Interleaved,
    )
    .unwrap();
    report
}

#[test]
fn fully_inverted_element_is_flagged() {
    let block = Block::unit_cube();
    // x ↦ -2x
    let uhat = sample(&block.coords, |x| Vector3::new(-3.0 * x.x, 0.0, 0.0));
    for form in [KernelForm::Fused, KernelForm::Staged] {
        let report = run(
            &block,
            &uhat,
            KernelConfig {
                form,
                ..KernelConfig::default()
            },
        );
        assert_eq!(report.points, 8);
        assert_eq!(report.inverted, 8);
        assert!(report.min_det_f < 0.0);
        match report.check_volume() {
            Err(KernelError::NonPositiveJacobian {
                element: 0,
                point: 0,
                det_f,
            }) => assert_relative_eq!(det_f, -2.0, epsilon = 1e-12),
            other => panic!("expected an inverted element, got {other:?}"),
        }
    }
}

#[test]
fn singular_mid_step_configuration_is_reported() {
    let block = Block::unit_cube();
    // x ↦ -x, F_mid = diag(0, 1, 1)
    let uhat = sample(&block.coords, |x| Vector3::new(-2.0 * x.x, 0.0, 0.0));
    let coords = Interleaved::new(&block.coords).unwrap();
    let model = Hypoelastic::from_moduli(1.0, 2.0).unwrap();
    let zeros = vec![0.0; block.coords.len()];
    for form in [KernelForm::Fused, KernelForm::Staged] {
        let mut state = MaterialState::new(block.num_points(), &model);
        let (report, forces) = common::step(
            &block,
            &OnTheFly::new(&coords),
            &model,
            KernelConfig {
                form,
                ..KernelConfig::default()
            },
            1.0,
            &Interleaved::new(&zeros).unwrap(),
            &Interleaved::new(&uhat).unwrap(),
            &mut state,
            Layout::Interleaved,
        )
        .unwrap();
        assert_eq!(report.points, 8);
        assert_eq!(report.inverted, 8);
        match report.check_volume() {
            Err(KernelError::NonPositiveJacobian {
                element: 0,
                point: 0,
                det_f,
            }) => assert_relative_eq!(det_f, -1.0, epsilon = 1e-12),
            other => panic!("expected an inverted element, got {other:?}"),
        }
        assert!(state.mean_stress().iter().all(|s| s.is_finite()));
        assert!(forces.values().iter().all(|f| f.is_finite()));
    }
}

#[test]
fn the_lowest_inverted_element_is_reported() {
    let block = Block {
        topology: lagfe::Topology::structured(4, 2, 2).unwrap(),
        coords: lagfe::structured_coordinates(4, 2, 2, [1.0, 1.0, 1.0]),
        map: lagfe::MaterialMap::identity(3),
    };
    // fold the last element over its neighbour
    let uhat = sample(&block.coords, |x| {
        if x.x > 2.5 {
            Vector3::new(-1.5, 0.0, 0.0)
        } else {
            Vector3::zeros()
        }
    });
    for policy in [ExecutionPolicy::Sequential, ExecutionPolicy::Threaded] {
        let report = run(
            &block,
            &uhat,
            KernelConfig {
                policy,
                ..KernelConfig::default()
            },
        );
        assert_eq!(report.points, 24);
        assert_eq!(report.inverted, 8);
        let (element, point, det_f) = report.first_inverted.unwrap();
        assert_eq!((element, point), (2, 0));
        assert_relative_eq!(det_f, -0.5, epsilon = 1e-12);
        assert!(matches!(
            report.check_volume(),
            Err(KernelError::NonPositiveJacobian { element: 2, .. })
        ));
    }
}

#[test]
fn excluding_the_inverted_element_accepts_the_step() {
    let block = Block {
        topology: lagfe::Topology::structured(4, 2, 2).unwrap(),
        coords: lagfe::structured_coordinates(4, 2, 2, [1.0, 1.0, 1.0]),
        map: lagfe::MaterialMap::identity(3),
    };
    let uhat = sample(&block.coords, |x| {
        if x.x > 2.5 {
            Vector3::new(-1.5, 0.0, 0.0)
        } else {
            Vector3::zeros()
        }
    });
    let coords = Interleaved::new(&block.coords).unwrap();
    let gradients = OnTheFly::new(&coords);
    let model = Hypoelastic::from_moduli(1.0, 2.0).unwrap();
    let kernel = lagfe::SolidMechanicsKernel::new(
        &block.topology,
        &gradients,
        &block.map,
        &model,
        KernelConfig::default(),
    )
    .unwrap();
    let zeros = vec![0.0; block.coords.len()];
    let mut state = MaterialState::new(24, &model);
    let forces = lagfe::ForceAccumulator::new(Layout::Interleaved, block.num_nodes());
    let active = ElementSet::from_indices(vec![0, 1], 3).unwrap();
    let report = kernel
        .fused(
            &active,
            1.0,
            &Interleaved::new(&zeros).unwrap(),
            &Interleaved::new(&uhat).unwrap(),
            &mut state,
            &forces,
        )
        .unwrap();
    assert!(report.check_volume().is_ok());
    assert!(report.min_det_f > 0.0);
}
