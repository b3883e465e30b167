//! Measured one-way delays between 20 reference cities, in milliseconds.
//!
//! Rows are the sending city and columns the receiving city. Values are not
//! symmetric: the delay from `a` to `b` can differ from `b` to `a`.

/// Number of cities in [`GEO_DELAY_MS`].
pub const NUM_CITIES: usize = 20;

pub const GEO_DELAY_MS: [[f64; NUM_CITIES]; NUM_CITIES] = [
    [
        1.0, 296.928, 36.986, 20.409, 24.794, 114.291, 124.786, 7.158, 141.355,
        27.041, 41.92, 6.151, 204.77, 281.861, 183.197, 21.62, 276.805,
        263.036, 93.053, 91.225,
    ],
    [
        286.701, 1.0, 295.947, 293.476, 299.945, 183.301, 403.763, 275.475,
        162.868, 290.705, 325.031, 280.406, 310.881, 275.683, 122.325, 309.163,
        27.954, 191.476, 200.025, 208.471,
    ],
    [
        37.02, 295.885, 1.0, 64.691, 44.147, 147.641, 298.107, 32.911, 154.864,
        33.321, 79.28, 28.58, 229.974, 283.125, 283.911, 64.068, 349.435,
        308.048, 114.397, 111.466,
    ],
    [
        21.655, 292.504, 64.448, 1.0, 44.213, 128.031, 166.586, 25.746,
        154.795, 22.578, 48.598, 24.474, 226.75, 228.028, 202.137, 40.721,
        329.261, 247.137, 115.047, 102.718,
    ],
    [
        24.645, 300.208, 44.117, 45.836, 1.0, 127.607, 153.503, 18.473,
        159.794, 29.343, 43.855, 24.118, 220.427, 274.238, 187.711, 10.267,
        350.329, 257.589, 110.576, 104.095,
    ],
    [
        114.348, 177.724, 156.003, 135.368, 128.56, 1.0, 226.789, 106.173,
        29.91, 127.173, 167.252, 116.563, 139.161, 306.019, 202.181, 143.448,
        182.98, 134.586, 43.34, 36.941,
    ],
    [
        124.853, 398.625, 298.227, 170.584, 153.574, 224.058, 1.0, 232.507,
        250.196, 134.52, 175.183, 153.978, 321.26, 339.943, 84.054, 141.563,
        268.929, 261.68, 215.679, 205.258,
    ],
    [
        7.069, 275.129, 32.877, 24.828, 18.435, 106.066, 232.099, 1.0, 132.723,
        23.269, 50.843, 5.334, 197.446, 275.735, 198.735, 28.293, 294.679,
        234.943, 83.542, 73.496,
    ],
    [
        141.236, 162.596, 154.723, 153.674, 159.786, 29.904, 247.623, 132.782,
        1.0, 153.371, 185.834, 144.435, 173.217, 195.546, 179.019, 159.125,
        156.547, 107.611, 58.763, 69.354,
    ],
    [
        27.11, 290.308, 33.351, 30.656, 29.415, 127.132, 134.475, 23.425,
        154.048, 1.0, 56.165, 21.329, 218.702, 342.649, 267.18, 38.005,
        381.607, 249.651, 115.757, 101.378,
    ],
    [
        42.321, 324.974, 79.044, 55.598, 43.859, 167.47, 175.968, 50.674,
        185.869, 55.931, 1.0, 56.673, 248.073, 148.801, 204.403, 21.157,
        342.171, 294.165, 133.209, 129.044,
    ],
    [
        9.209, 279.948, 28.734, 22.704, 28.07, 117.135, 130.943, 5.48, 149.376,
        17.61, 61.736, 1.0, 204.172, 279.17, 260.415, 42.758, 365.667, 252.355,
        114.698, 91.369,
    ],
    [
        204.529, 310.635, 237.215, 222.165, 214.811, 135.386, 316.096, 190.667,
        173.16, 223.296, 252.358, 229.861, 1.0, 356.349, 349.441, 228.036,
        314.972, 266.768, 137.577, 126.636,
    ],
    [
        284.393, 276.257, 286.52, 227.285, 274.416, 212.749, 342.619, 277.733,
        153.516, 336.035, 148.591, 271.151, 366.362, 1.0, 235.712, 284.305,
        148.917, 74.656, 216.897, 259.348,
    ],
    [
        180.516, 118.915, 283.852, 202.361, 197.584, 202.168, 84.107, 181.458,
        179.024, 267.165, 204.386, 251.497, 349.76, 235.791, 1.0, 202.265,
        93.559, 66.873, 241.053, 242.352,
    ],
    [
        21.591, 309.057, 64.05, 41.096, 10.33, 143.388, 141.558, 28.256,
        159.239, 38.228, 21.291, 29.722, 228.183, 284.382, 202.297, 1.0,
        362.993, 288.137, 126.377, 115.36,
    ],
    [
        295.71, 25.877, 349.888, 360.115, 317.624, 251.018, 270.281, 294.423,
        156.664, 317.537, 374.436, 355.073, 315.271, 148.589, 93.654, 393.391,
        1.0, 114.007, 220.726, 231.18,
    ],
    [
        265.392, 191.89, 308.0, 247.975, 257.657, 134.503, 261.22, 235.604,
        107.616, 248.756, 294.027, 235.052, 266.815, 73.862, 67.057, 288.337,
        114.908, 1.0, 172.82, 157.804,
    ],
    [
        92.821, 199.057, 110.957, 115.542, 117.678, 43.363, 212.605, 83.698,
        58.722, 115.425, 131.442, 101.325, 139.016, 216.807, 241.289, 126.485,
        219.442, 172.79, 1.0, 21.106,
    ],
    [
        94.04, 208.082, 111.349, 103.343, 104.072, 38.178, 205.549, 73.288,
        69.407, 105.464, 129.584, 82.41, 126.681, 239.586, 246.168, 114.586,
        262.434, 160.829, 21.182, 1.0,
    ],
];

#[cfg(test)]
mod tests {
    use super::{GEO_DELAY_MS, NUM_CITIES};

    #[test]
    fn same_city_delay_is_one_ms() {
        for city in 0..NUM_CITIES {
            assert_eq!(GEO_DELAY_MS[city][city], 1.0);
        }
    }
}
