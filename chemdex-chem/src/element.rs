//! Periodic table data and element lookup.

/// A chemical element from the periodic table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    pub atomic_number: u8,
    pub symbol: &'static str,
    pub name: &'static str,
    pub atomic_weight: f64,
    /// Default valence used for implicit-hydrogen assignment.
    pub valence: u8,
    pub max_bonds: u8,
}

macro_rules! elem {
    ($num:expr, $sym:expr, $name:expr, $weight:expr, $val:expr, $max:expr) => {
        Element {
            atomic_number: $num,
            symbol: $sym,
            name: $name,
            atomic_weight: $weight,
            valence: $val,
            max_bonds: $max,
        }
    };
}

/// Elements 1–54 (H through Xe), covering everything the SD ingestion path
/// encounters in practice.
static ELEMENTS: [Element; 54] = [
    elem!(1, "H", "Hydrogen", 1.008, 1, 1),
    elem!(2, "He", "Helium", 4.003, 0, 0),
    elem!(3, "Li", "Lithium", 6.941, 1, 1),
    elem!(4, "Be", "Beryllium", 9.012, 2, 2),
    elem!(5, "B", "Boron", 10.81, 3, 4),
    elem!(6, "C", "Carbon", 12.011, 4, 4),
    elem!(7, "N", "Nitrogen", 14.007, 3, 4),
    elem!(8, "O", "Oxygen", 15.999, 2, 3),
    elem!(9, "F", "Fluorine", 18.998, 1, 1),
    elem!(10, "Ne", "Neon", 20.180, 0, 0),
    elem!(11, "Na", "Sodium", 22.990, 1, 1),
    elem!(12, "Mg", "Magnesium", 24.305, 2, 2),
    elem!(13, "Al", "Aluminum", 26.982, 3, 4),
    elem!(14, "Si", "Silicon", 28.086, 4, 4),
    elem!(15, "P", "Phosphorus", 30.974, 3, 6),
    elem!(16, "S", "Sulfur", 32.06, 2, 6),
    elem!(17, "Cl", "Chlorine", 35.45, 1, 1),
    elem!(18, "Ar", "Argon", 39.948, 0, 0),
    elem!(19, "K", "Potassium", 39.098, 1, 1),
    elem!(20, "Ca", "Calcium", 40.078, 2, 2),
    elem!(21, "Sc", "Scandium", 44.956, 3, 6),
    elem!(22, "Ti", "Titanium", 47.867, 4, 6),
    elem!(23, "V", "Vanadium", 50.942, 5, 6),
    elem!(24, "Cr", "Chromium", 51.996, 3, 6),
    elem!(25, "Mn", "Manganese", 54.938, 2, 6),
    elem!(26, "Fe", "Iron", 55.845, 3, 6),
    elem!(27, "Co", "Cobalt", 58.933, 3, 6),
    elem!(28, "Ni", "Nickel", 58.693, 2, 6),
    elem!(29, "Cu", "Copper", 63.546, 2, 6),
    elem!(30, "Zn", "Zinc", 65.38, 2, 4),
    elem!(31, "Ga", "Gallium", 69.723, 3, 4),
    elem!(32, "Ge", "Germanium", 72.63, 4, 4),
    elem!(33, "As", "Arsenic", 74.922, 3, 5),
    elem!(34, "Se", "Selenium", 78.96, 2, 6),
    elem!(35, "Br", "Bromine", 79.904, 1, 1),
    elem!(36, "Kr", "Krypton", 83.798, 0, 0),
    elem!(37, "Rb", "Rubidium", 85.468, 1, 1),
    elem!(38, "Sr", "Strontium", 87.62, 2, 2),
    elem!(39, "Y", "Yttrium", 88.906, 3, 6),
    elem!(40, "Zr", "Zirconium", 91.224, 4, 6),
    elem!(41, "Nb", "Niobium", 92.906, 5, 6),
    elem!(42, "Mo", "Molybdenum", 95.95, 6, 6),
    elem!(43, "Tc", "Technetium", 98.0, 7, 7),
    elem!(44, "Ru", "Ruthenium", 101.07, 4, 8),
    elem!(45, "Rh", "Rhodium", 102.906, 3, 6),
    elem!(46, "Pd", "Palladium", 106.42, 2, 6),
    elem!(47, "Ag", "Silver", 107.868, 1, 4),
    elem!(48, "Cd", "Cadmium", 112.414, 2, 4),
    elem!(49, "In", "Indium", 114.818, 3, 4),
    elem!(50, "Sn", "Tin", 118.710, 4, 4),
    elem!(51, "Sb", "Antimony", 121.760, 3, 5),
    elem!(52, "Te", "Tellurium", 127.60, 2, 6),
    elem!(53, "I", "Iodine", 126.904, 1, 1),
    elem!(54, "Xe", "Xenon", 131.293, 0, 0),
];

/// Look up an element by its symbol (e.g. "C", "Fe").
pub fn element_by_symbol(symbol: &str) -> Option<&'static Element> {
    ELEMENTS.iter().find(|e| e.symbol == symbol)
}

/// Look up an element by its atomic number (1-based).
pub fn element_by_number(n: u8) -> Option<&'static Element> {
    if (1..=54).contains(&n) {
        Some(&ELEMENTS[(n - 1) as usize])
    } else {
        None
    }
}
