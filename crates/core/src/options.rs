//! Choice lists used by the built-in Sơ yếu lý lịch catalog.

pub const GENDERS: &[&str] = &["Nam", "Nữ"];

/// The 63 provinces and centrally-run cities.
pub const PROVINCES: &[&str] = &[
    "Hà Nội",
    "Thành phố Hồ Chí Minh",
    "Hải Phòng",
    "Đà Nẵng",
    "Cần Thơ",
    "An Giang",
    "Bà Rịa - Vũng Tàu",
    "Bắc Giang",
    "Bắc Kạn",
    "Bạc Liêu",
    "Bắc Ninh",
    "Bến Tre",
    "Bình Định",
    "Bình Dương",
    "Bình Phước",
    "Bình Thuận",
    "Cà Mau",
    "Cao Bằng",
    "Đắk Lắk",
    "Đắk Nông",
    "Điện Biên",
    "Đồng Nai",
    "Đồng Tháp",
    "Gia Lai",
    "Hà Giang",
    "Hà Nam",
    "Hà Tĩnh",
    "Hải Dương",
    "Hậu Giang",
    "Hòa Bình",
    "Hưng Yên",
    "Khánh Hòa",
    "Kiên Giang",
    "Kon Tum",
    "Lai Châu",
    "Lâm Đồng",
    "Lạng Sơn",
    "Lào Cai",
    "Long An",
    "Nam Định",
    "Nghệ An",
    "Ninh Bình",
    "Ninh Thuận",
    "Phú Thọ",
    "Phú Yên",
    "Quảng Bình",
    "Quảng Nam",
    "Quảng Ngãi",
    "Quảng Ninh",
    "Quảng Trị",
    "Sóc Trăng",
    "Sơn La",
    "Tây Ninh",
    "Thái Bình",
    "Thái Nguyên",
    "Thanh Hóa",
    "Thừa Thiên Huế",
    "Tiền Giang",
    "Trà Vinh",
    "Tuyên Quang",
    "Vĩnh Long",
    "Vĩnh Phúc",
    "Yên Bái",
];

pub const DEGREES: &[&str] = &[
    "Không có",
    "Trung học cơ sở",
    "Trung học phổ thông",
    "Trung cấp",
    "Cao đẳng",
    "Đại học",
    "Kỹ sư",
    "Dược sĩ đại học",
    "Bác sĩ đa khoa",
    "Thạc sĩ",
    "Tiến sĩ",
    "Tiến sĩ khoa học",
    "Phó giáo sư",
    "Giáo sư",
    "Văn bằng 2",
];

pub const EDUCATION_FORMATS: &[&str] = &["Chính quy", "Tại chức", "Từ xa", "Liên thông"];

/// Completed high-school grades, `n/12`.
pub const HIGH_SCHOOL: &[&str] = &[
    "12/12", "11/12", "10/12", "9/12", "8/12", "7/12", "6/12", "5/12", "4/12", "3/12", "2/12",
    "1/12", "0/12",
];

pub const ETHNIC_GROUPS: &[&str] = &[
    "Kinh",
    "Tày",
    "Thái",
    "Mường",
    "H'Mông",
    "Khmer",
    "Nùng",
    "Hoa",
    "Dao",
    "Gia Rai",
    "Ê Đê",
    "Ba Na",
    "Sán Chay",
    "Cơ Ho",
    "Sán Dìu",
    "Chăm",
    "Hrê",
    "Raglai",
    "Mnông",
    "Xơ Đăng",
    "X'Tiêng",
    "Bru-Vân Kiều",
    "Thổ",
    "Khơ Mú",
    "Cơ Tu",
    "Giáy",
    "Gié Triêng",
    "Tà Ôi",
    "Mạ",
    "Co",
    "Chơ Ro",
    "Xinh Mun",
    "Hà Nhì",
    "Chu Ru",
    "Lào",
    "La Chí",
    "La Ha",
    "Phù Lá",
    "La Hủ",
    "Lự",
    "Lô Lô",
    "Chứt",
    "Mảng",
    "Pà Thẻn",
    "Cờ Lao",
    "Bố Y",
    "Cống",
    "Ngái",
    "Si La",
    "Pu Péo",
    "Brâu",
    "Rơ Măm",
    "Ơ Đu",
    "Người nước ngoài (Foreign)",
    "Không rõ (Unknown)",
];

pub const RELIGIONS: &[&str] = &[
    "Không",
    "Phật giáo",
    "Công giáo",
    "Tin Lành",
    "Hòa Hảo",
    "Cao Đài",
    "Hồi giáo",
    "Bửu Sơn Kỳ Hương",
    "Tịnh độ cư sĩ",
    "Phật giáo Tứ Ân Hiếu Nghĩa",
    "Phật giáo Nam tông",
    "Phật giáo Bắc tông",
    "Minh Sư Đạo",
    "Minh Lý Đạo",
    "Baháʼí",
    "Ấn Độ giáo",
    "Do Thái giáo",
    "Chăm Bà-la-môn",
    "Chăm Islam",
    "Khác (Other – Ghi rõ)",
];

pub const WORK_POSITIONS: &[&str] = &[
    "Thực tập",
    "Nhân viên",
    "Tổ trưởng",
    "Phó phòng",
    "Trưởng phòng",
    "Trợ lý",
    "Thư ký",
    "Giám sát",
    "Trưởng nhóm",
    "Phó giám đốc",
    "Giám đốc",
    "Chủ tịch",
    "Phó chủ tịch",
    "Tổng giám đốc",
    "Phó tổng giám đốc",
    "Cố vấn",
    "Giáo viên",
    "Kỹ sư",
    "Khác (Other – Ghi rõ)",
];

/// State honours, orders and prizes. `Không có` is the default.
pub const AWARDS: &[&str] = &[
    "Không có",
    "Nhà giáo ưu tú",
    "Nhà giáo nhân dân",
    "Nghệ sĩ ưu tú",
    "Nghệ sĩ nhân dân",
    "Thầy thuốc ưu tú",
    "Thầy thuốc nhân dân",
    "Nhà khoa học ưu tú",
    "Nhà khoa học nhân dân",
    "Anh hùng Lao động",
    "Anh hùng Lực lượng vũ trang",
    "Chiến sĩ thi đua toàn quốc",
    "Huân chương Lao động",
    "Huân chương Độc lập",
    "Huân chương Quân công",
    "Huân chương Chiến công",
    "Huân chương Kháng chiến",
    "Huân chương Hữu nghị",
    "Huân chương Hồ Chí Minh",
    "Giải thưởng Hồ Chí Minh",
    "Giải thưởng Nhà nước",
    "Bằng khen của Thủ tướng",
    "Bằng khen của Chủ tịch nước",
    "Bằng khen của Bộ trưởng",
    "Giải thưởng Khoa học & Công nghệ",
    "Giải thưởng Sáng tạo Khoa học Kỹ thuật",
    "Giải thưởng quốc tế",
    "Khác (Other – Ghi rõ)",
];
