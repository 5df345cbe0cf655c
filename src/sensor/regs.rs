//! Register maps and bring-up tables for the two Himax sensors on the board.
//!
//! Both parts use 16-bit register addresses with 8-bit values. A write on the bus is three bytes:
//! register high byte, register low byte, value.

/// One register write of a bring-up table.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RegWrite {
    pub register: u16,
    pub value: u8,
}

impl RegWrite {
    pub const fn new(register: u16, value: u8) -> Self {
        RegWrite { register, value }
    }

    /// Bytes put on the bus for this write.
    pub fn encode(&self) -> [u8; 3] {
        let [hi, lo] = self.register.to_be_bytes();
        [hi, lo, self.value]
    }
}

const fn w(register: u16, value: u8) -> RegWrite {
    RegWrite::new(register, value)
}

/// 7-bit bus address of the HM01B0; the I2C driver shifts in the R/W bit.
pub const HM01B0_ADDRESS: u8 = 0x24;

/// 7-bit bus address of the HM0360.
pub const HM0360_ADDRESS: u8 = 0x35;

/// Register addresses shared by both sensors, plus the HM0360-only ones its table names.
pub struct Register;

impl Register {
    pub const MODE_SELECT: u16 = 0x0100;
    pub const IMG_ORIENTATION: u16 = 0x0101;
    pub const SW_RESET: u16 = 0x0103;
    pub const COMMAND_UPDATE: u16 = 0x0104;
    pub const INTEGRATION_H: u16 = 0x0202;
    pub const INTEGRATION_L: u16 = 0x0203;
    pub const PLL1_CONFIG: u16 = 0x0300;
    pub const PLL2_CONFIG: u16 = 0x0301;
    pub const PLL3_CONFIG: u16 = 0x0302;
    pub const FRAME_LEN_LINES_H: u16 = 0x0340;
    pub const FRAME_LEN_LINES_L: u16 = 0x0341;
    pub const LINE_LEN_PCK_H: u16 = 0x0342;
    pub const LINE_LEN_PCK_L: u16 = 0x0343;
    pub const MONO_MODE: u16 = 0x0370;
    pub const MONO_MODE_ISP: u16 = 0x0371;
    pub const MONO_MODE_SEL: u16 = 0x0372;
    pub const H_SUBSAMPLE: u16 = 0x0380;
    pub const V_SUBSAMPLE: u16 = 0x0381;
    pub const BINNING_MODE: u16 = 0x0382;
    pub const BLC_TGT: u16 = 0x1004;
    pub const BLC2_TGT: u16 = 0x1009;
    pub const MONO_CTRL: u16 = 0x100A;
    pub const OPFM_CTRL: u16 = 0x1014;
    pub const CMPRS_CTRL: u16 = 0x102F;
    pub const CMPRS_01: u16 = 0x1030;
    pub const CMPRS_02: u16 = 0x1031;
    pub const CMPRS_03: u16 = 0x1032;
    pub const CMPRS_04: u16 = 0x1033;
    pub const CMPRS_05: u16 = 0x1034;
    pub const CMPRS_06: u16 = 0x1035;
    pub const CMPRS_07: u16 = 0x1036;
    pub const CMPRS_08: u16 = 0x1037;
    pub const CMPRS_09: u16 = 0x1038;
    pub const CMPRS_10: u16 = 0x1039;
    pub const CMPRS_11: u16 = 0x103A;
    pub const CMPRS_12: u16 = 0x103B;
    pub const CMPRS_13: u16 = 0x103C;
    pub const CMPRS_14: u16 = 0x103D;
    pub const CMPRS_15: u16 = 0x103E;
    pub const CMPRS_16: u16 = 0x103F;
    pub const AE_CTRL: u16 = 0x2000;
    pub const AE_CTRL1: u16 = 0x2001;
    pub const MAX_INTG_H: u16 = 0x2029;
    pub const MAX_INTG_L: u16 = 0x202A;
    pub const MAX_AGAIN: u16 = 0x202B;
    pub const MAX_DGAIN_H: u16 = 0x202C;
    pub const MAX_DGAIN_L: u16 = 0x202D;
    pub const T_DAMPING: u16 = 0x2031;
    pub const N_DAMPING: u16 = 0x2032;
    pub const AE_TARGET_MEAN: u16 = 0x2034;
    pub const AE_MIN_MEAN: u16 = 0x2035;
    pub const AE_TARGET_ZONE: u16 = 0x2036;
    pub const CONVERGE_IN_TH: u16 = 0x2037;
    pub const CONVERGE_OUT_TH: u16 = 0x2038;
    pub const PULSE_MODE: u16 = 0x2061;
    pub const MD_CTRL: u16 = 0x2080;
    pub const ROI_START_END_V: u16 = 0x2081;
    pub const ROI_START_END_H: u16 = 0x2082;
    pub const MD_TH_MIN: u16 = 0x2083;
    pub const MD_BLOCK_NUM_TH: u16 = 0x209B;
    pub const MD_CTRL1: u16 = 0x209E;
    pub const PMU_CFG_3: u16 = 0x3024;
    pub const WIN_MODE: u16 = 0x3030;
    pub const PAD_REGISTER_07: u16 = 0x3112;
}

/// HM01B0 soft reset: pulse the reset register.
pub static HM01B0_RESET: [RegWrite; 2] = [
    w(Register::SW_RESET, 0xFF),
    w(Register::SW_RESET, 0x00),
];

/// HM01B0 bring-up: 324 x 244 monochrome over the 4-bit bus, streaming.
pub static HM01B0_INIT: &[RegWrite] = &[
    // Stop streaming while the sensor is set up
    w(Register::MODE_SELECT, 0x00),

    // Black level
    w(0x1003, 0x08),
    w(0x1007, 0x08),

    // Analog
    w(0x3044, 0x0A),
    w(0x3045, 0x00),
    w(0x3047, 0x0A),
    w(0x3050, 0xC0),
    w(0x3051, 0x42),
    w(0x3052, 0x50),
    w(0x3053, 0x00),
    w(0x3054, 0x03),
    w(0x3055, 0xF7),
    w(0x3056, 0xF8),
    w(0x3057, 0x29),
    w(0x3058, 0x1F),
    w(0x3064, 0x00),
    w(0x3065, 0x04),

    // Digital
    w(0x1000, 0x43),
    w(0x1001, 0x40),
    w(0x1002, 0x32),
    w(0x0350, 0x7F),
    w(0x1006, 0x01),
    w(0x1008, 0x00),
    w(0x1009, 0xA0),
    w(0x100A, 0x60),
    w(0x100B, 0x90),
    w(0x100C, 0x40),
    w(0x3022, 0x01),
    w(0x1012, 0x01),

    // Automatic exposure
    w(0x2000, 0x07),
    w(0x2003, 0x00),
    w(0x2004, 0x1C),
    w(0x2007, 0x00),
    w(0x2008, 0x58),
    w(0x200B, 0x00),
    w(0x200C, 0x7A),
    w(0x200F, 0x00),
    w(0x2010, 0xB8),
    w(0x2013, 0x00),
    w(0x2014, 0x58),
    w(0x2017, 0x00),
    w(0x2018, 0x9B),
    w(0x2100, 0x01),
    w(0x2101, 0x5F),
    w(0x2102, 0x0A),
    w(0x2103, 0x03),
    w(0x2104, 0x05),
    w(0x2105, 0x02),
    w(0x2106, 0x14),
    w(0x2107, 0x02),
    w(0x2108, 0x03),
    w(0x2109, 0x03),
    w(0x210A, 0x00),
    w(0x210B, 0x80),
    w(0x210C, 0x40),
    w(0x210D, 0x20),
    w(0x210E, 0x03),
    w(0x210F, 0x00),
    w(0x2110, 0x85),
    w(0x2111, 0x00),
    w(0x2112, 0xA0),
    w(0x2150, 0x03),

    // Frame timing
    w(Register::FRAME_LEN_LINES_H, 0x01),
    w(Register::FRAME_LEN_LINES_L, 0x7A),
    w(Register::LINE_LEN_PCK_H, 0x01),
    w(Register::LINE_LEN_PCK_L, 0x77),

    // 324 x 244 window, no binning
    w(0x3010, 0x01),
    w(0x0383, 0x01),
    w(0x0387, 0x01),
    w(0x0390, 0x00),

    // Output
    w(0x3011, 0x70),
    // 4-bit data bus
    w(0x3059, 0x42),
    w(0x3060, 0x01),
    w(Register::IMG_ORIENTATION, 0x01),
    w(Register::COMMAND_UPDATE, 0x01),
    w(Register::MODE_SELECT, 0x01),
];

/// HM0360 bring-up: QVGA monochrome over the 8-bit bus, streaming.
pub static HM0360_INIT: &[RegWrite] = &[
    w(Register::SW_RESET, 0x00),
    w(Register::MONO_MODE, 0x00),
    w(Register::MONO_MODE_ISP, 0x01),
    w(Register::MONO_MODE_SEL, 0x01),

    // Black level
    w(0x1000, 0x01),
    w(0x1003, 0x04),
    w(Register::BLC_TGT, 0x04),
    w(0x1007, 0x01),
    w(0x1008, 0x04),
    w(Register::BLC2_TGT, 0x04),
    w(Register::MONO_CTRL, 0x03),

    // Output format
    w(Register::OPFM_CTRL, 0x0C),

    // Reserved
    w(0x101D, 0x00),
    w(0x101E, 0x01),
    w(0x101F, 0x00),
    w(0x1020, 0x01),
    w(0x1021, 0x00),

    w(Register::CMPRS_CTRL, 0x00),
    w(Register::CMPRS_01, 0x09),
    w(Register::CMPRS_02, 0x12),
    w(Register::CMPRS_03, 0x23),
    w(Register::CMPRS_04, 0x31),
    w(Register::CMPRS_05, 0x3E),
    w(Register::CMPRS_06, 0x4B),
    w(Register::CMPRS_07, 0x56),
    w(Register::CMPRS_08, 0x5E),
    w(Register::CMPRS_09, 0x65),
    w(Register::CMPRS_10, 0x72),
    w(Register::CMPRS_11, 0x7F),
    w(Register::CMPRS_12, 0x8C),
    w(Register::CMPRS_13, 0x98),
    w(Register::CMPRS_14, 0xB2),
    w(Register::CMPRS_15, 0xCC),
    w(Register::CMPRS_16, 0xE6),

    w(Register::PAD_REGISTER_07, 0x00),

    w(Register::PLL1_CONFIG, 0x0B),
    w(Register::PLL2_CONFIG, 0x0A),
    w(Register::PLL3_CONFIG, 0x77),

    w(Register::PMU_CFG_3, 0x08),
    w(Register::PAD_REGISTER_07, 0x00),

    w(Register::AE_CTRL, 0x5F),
    w(Register::AE_CTRL1, 0x00),
    w(Register::T_DAMPING, 0x20),
    w(Register::N_DAMPING, 0x00),
    w(Register::AE_TARGET_MEAN, 0x64),
    w(Register::AE_MIN_MEAN, 0x0A),
    w(Register::AE_TARGET_ZONE, 0x23),
    w(Register::CONVERGE_IN_TH, 0x03),
    w(Register::CONVERGE_OUT_TH, 0x05),
    w(Register::MAX_INTG_H, 0x01),
    w(Register::MAX_INTG_L, 0x05),

    w(Register::MAX_AGAIN, 0x04),
    w(Register::MAX_DGAIN_H, 0x03),
    w(Register::MAX_DGAIN_L, 0x3F),
    w(Register::INTEGRATION_H, 0x01),
    w(Register::INTEGRATION_L, 0x08),

    w(Register::MD_CTRL, 0x6A),
    w(Register::MD_TH_MIN, 0x01),
    w(Register::MD_BLOCK_NUM_TH, 0x01),
    w(Register::MD_CTRL1, 0x06),
    w(Register::PULSE_MODE, 0x00),
    w(Register::ROI_START_END_V, 0xF0),
    w(Register::ROI_START_END_H, 0xF0),

    w(Register::FRAME_LEN_LINES_H, 0x01),
    w(Register::FRAME_LEN_LINES_L, 0x09),
    w(Register::LINE_LEN_PCK_H, 0x01),
    w(Register::LINE_LEN_PCK_L, 0x78),
    w(Register::H_SUBSAMPLE, 0x01),
    w(Register::V_SUBSAMPLE, 0x01),
    w(Register::BINNING_MODE, 0x00),
    w(Register::WIN_MODE, 0x00),
    w(Register::IMG_ORIENTATION, 0x00),
    w(Register::COMMAND_UPDATE, 0x01),

    // Sync function
    w(0x3010, 0x00),
    w(0x3013, 0x01),
    w(0x3019, 0x00),
    w(0x301A, 0x00),
    w(0x301B, 0x20),
    w(0x301C, 0xFF),

    // Pre-metering
    w(0x3026, 0x03),
    w(0x3027, 0x81),
    w(0x3028, 0x01),
    w(0x3029, 0x00),
    w(0x302A, 0x30),
    w(0x302E, 0x00),
    w(0x302F, 0x00),

    // Vendor analog tuning
    w(0x302B, 0x2A),
    w(0x302C, 0x00),
    w(0x302D, 0x03),
    w(0x3031, 0x01),
    w(0x3051, 0x00),
    w(0x305C, 0x03),
    w(0x3060, 0x00),
    w(0x3061, 0xFA),
    w(0x3062, 0xFF),
    w(0x3063, 0xFF),
    w(0x3064, 0xFF),
    w(0x3065, 0xFF),
    w(0x3066, 0xFF),
    w(0x3067, 0xFF),
    w(0x3068, 0xFF),
    w(0x3069, 0xFF),
    w(0x306A, 0xFF),
    w(0x306B, 0xFF),
    w(0x306C, 0xFF),
    w(0x306D, 0xFF),
    w(0x306E, 0xFF),
    w(0x306F, 0xFF),
    w(0x3070, 0xFF),
    w(0x3071, 0xFF),
    w(0x3072, 0xFF),
    w(0x3073, 0xFF),
    w(0x3074, 0xFF),
    w(0x3075, 0xFF),
    w(0x3076, 0xFF),
    w(0x3077, 0xFF),
    w(0x3078, 0xFF),
    w(0x3079, 0xFF),
    w(0x307A, 0xFF),
    w(0x307B, 0xFF),
    w(0x307C, 0xFF),
    w(0x307D, 0xFF),
    w(0x307E, 0xFF),
    w(0x307F, 0xFF),
    w(0x3080, 0x01),
    w(0x3081, 0x01),
    w(0x3082, 0x03),
    w(0x3083, 0x20),
    w(0x3084, 0x00),
    w(0x3085, 0x20),
    w(0x3086, 0x00),
    w(0x3087, 0x20),
    w(0x3088, 0x00),
    w(0x3089, 0x04),
    w(0x3094, 0x02),
    w(0x3095, 0x02),
    w(0x3096, 0x00),
    w(0x3097, 0x02),
    w(0x3098, 0x00),
    w(0x3099, 0x02),
    w(0x309E, 0x05),
    w(0x309F, 0x02),
    w(0x30A0, 0x02),
    w(0x30A1, 0x00),
    w(0x30A2, 0x08),
    w(0x30A3, 0x00),
    w(0x30A4, 0x20),
    w(0x30A5, 0x04),
    w(0x30A6, 0x02),
    w(0x30A7, 0x02),
    w(0x30A8, 0x01),
    w(0x30A9, 0x00),
    w(0x30AA, 0x02),
    w(0x30AB, 0x34),
    w(0x30B0, 0x03),
    w(0x30C4, 0x10),
    w(0x30C5, 0x01),
    w(0x30C6, 0xBF),
    w(0x30C7, 0x00),
    w(0x30C8, 0x00),
    w(0x30CB, 0xFF),
    w(0x30CC, 0xFF),
    w(0x30CD, 0x7F),
    w(0x30CE, 0x7F),
    w(0x30D3, 0x01),
    w(0x30D4, 0xFF),
    w(0x30D5, 0x00),
    w(0x30D6, 0x40),
    w(0x30D7, 0x00),
    w(0x30D8, 0xA7),
    w(0x30D9, 0x05),
    w(0x30DA, 0x01),
    w(0x30DB, 0x40),
    w(0x30DC, 0x00),
    w(0x30DD, 0x27),
    w(0x30DE, 0x05),
    w(0x30DF, 0x07),
    w(0x30E0, 0x40),
    w(0x30E1, 0x00),
    w(0x30E2, 0x27),
    w(0x30E3, 0x05),
    w(0x30E4, 0x47),
    w(0x30E5, 0x30),
    w(0x30E6, 0x00),
    w(0x30E7, 0x27),
    w(0x30E8, 0x05),
    w(0x30E9, 0x87),
    w(0x30EA, 0x30),
    w(0x30EB, 0x00),
    w(0x30EC, 0x27),
    w(0x30ED, 0x05),
    w(0x30EE, 0x00),
    w(0x30EF, 0x40),
    w(0x30F0, 0x00),
    w(0x30F1, 0xA7),
    w(0x30F2, 0x05),
    w(0x30F3, 0x01),
    w(0x30F4, 0x40),
    w(0x30F5, 0x00),
    w(0x30F6, 0x27),
    w(0x30F7, 0x05),
    w(0x30F8, 0x07),
    w(0x30F9, 0x40),
    w(0x30FA, 0x00),
    w(0x30FB, 0x27),
    w(0x30FC, 0x05),
    w(0x30FD, 0x47),
    w(0x30FE, 0x30),
    w(0x30FF, 0x00),
    w(0x3100, 0x27),
    w(0x3101, 0x05),
    w(0x3102, 0x87),
    w(0x3103, 0x30),
    w(0x3104, 0x00),
    w(0x3105, 0x27),
    w(0x3106, 0x05),
    w(0x310B, 0x10),
    w(0x3113, 0xA0),
    w(0x3114, 0x67),
    w(0x3115, 0x42),
    w(0x3116, 0x10),
    w(0x3117, 0x0A),
    w(0x3118, 0x3F),
    w(0x311C, 0x10),
    w(0x311D, 0x06),
    w(0x311E, 0x0F),
    w(0x311F, 0x0E),
    w(0x3120, 0x0D),
    w(0x3121, 0x0F),
    w(0x3122, 0x00),
    w(0x3123, 0x1D),
    w(0x3126, 0x03),
    w(0x3128, 0x57),
    w(0x312A, 0x11),
    w(0x312B, 0x41),
    w(0x312E, 0x00),
    w(0x312F, 0x00),
    w(0x3130, 0x0C),
    w(0x3141, 0x2A),
    w(0x3142, 0x9F),
    w(0x3147, 0x18),
    w(0x3149, 0x18),
    w(0x314B, 0x01),
    w(0x3150, 0x50),
    w(0x3152, 0x00),
    w(0x3156, 0x2C),
    w(0x315A, 0x0A),
    w(0x315B, 0x2F),
    w(0x315C, 0xE0),
    w(0x315F, 0x02),
    w(0x3160, 0x1F),
    w(0x3163, 0x1F),
    w(0x3164, 0x7F),
    w(0x3165, 0x7F),
    w(0x317B, 0x94),
    w(0x317C, 0x00),
    w(0x317D, 0x02),
    w(0x318C, 0x00),

    // PCLK samples on the rising edge
    w(Register::PAD_REGISTER_07, 0x04),

    // Free-running PCLK
    w(Register::OPFM_CTRL, 0x0B),

    w(Register::COMMAND_UPDATE, 0x01),

    w(Register::MODE_SELECT, 0x01),
];
