use criterion::{black_box, criterion_group, criterion_main, Criterion};

use chemdex_chem::fingerprint::CLASS_DEFAULT;
use chemdex_chem::{
    canonical_smiles, has_substructure, linear_fingerprint, parse_smiles, Fingerprint,
};

/// A set of representative drug-like SMILES strings
const SMILES_SET: &[&str] = &[
    "CCO",                                  // ethanol
    "CC(=O)O",                              // acetic acid
    "c1ccccc1",                             // benzene
    "CC(=O)Oc1ccccc1C(=O)O",                // aspirin
    "CN1C=NC2=C1C(=O)N(C(=O)N2C)C",         // caffeine
    "CC(C)CC1=CC=C(C=C1)C(C)C(=O)O",        // ibuprofen
    "OC(=O)C1=CC=CC=C1O",                   // salicylic acid
    "C1=CC=C(C=C1)O",                       // phenol
    "CC(=O)NC1=CC=C(C=C1)O",                // acetaminophen
    "C(C(=O)O)N",                           // glycine
    "c1ccc2ccccc2c1",                       // naphthalene
    "C1CCCCC1",                             // cyclohexane
    "C(=O)(N)N",                            // urea
    "CC(O)CC",                              // 2-butanol
    "CCCCCCCC",                             // octane
    "c1ccncc1",                             // pyridine
    "C1=CN=CN=C1",                          // pyrimidine
    "c1cc[nH]c1",                           // pyrrole
    "C1=CSC=C1",                            // thiophene
    "Clc1ccccc1",                           // chlorobenzene
];

fn bench_smiles_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("smiles_parse");

    let smiles_1k: Vec<&str> = SMILES_SET.iter().copied().cycle().take(1000).collect();

    group.bench_function("1k_mols_sanitized", |b| {
        b.iter(|| {
            for &smi in black_box(&smiles_1k) {
                let _ = parse_smiles(smi, true);
            }
        })
    });

    group.finish();
}

fn bench_canonicalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonical_smiles");

    let mols: Vec<_> = SMILES_SET
        .iter()
        .filter_map(|s| parse_smiles(s, true).ok())
        .collect();
    let mols_1k: Vec<_> = mols.iter().cycle().take(1000).collect();

    group.bench_function("1k_mols", |b| {
        b.iter(|| {
            for mol in black_box(&mols_1k) {
                let _ = canonical_smiles(mol);
            }
        })
    });

    group.finish();
}

fn bench_linear_fp(c: &mut Criterion) {
    let mut group = c.benchmark_group("linear_fp");

    let mols: Vec<_> = SMILES_SET
        .iter()
        .filter_map(|s| parse_smiles(s, true).ok())
        .collect();
    let mols_1k: Vec<_> = mols.iter().cycle().take(1000).collect();

    group.bench_function("1k_mols_w512_l5", |b| {
        b.iter(|| {
            for mol in black_box(&mols_1k) {
                let _: Fingerprint = linear_fingerprint(mol, 512, 5, CLASS_DEFAULT, false);
            }
        })
    });

    group.finish();
}

fn bench_substructure(c: &mut Criterion) {
    let mut group = c.benchmark_group("substructure");

    let targets: Vec<_> = SMILES_SET
        .iter()
        .filter_map(|s| parse_smiles(s, true).ok())
        .collect();
    let benzene = parse_smiles("c1ccccc1", true).unwrap();

    group.bench_function("benzene_vs_set", |b| {
        b.iter(|| {
            for target in black_box(&targets) {
                let _ = has_substructure(target, black_box(&benzene));
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_smiles_parse,
    bench_canonicalize,
    bench_linear_fp,
    bench_substructure
);
criterion_main!(benches);
